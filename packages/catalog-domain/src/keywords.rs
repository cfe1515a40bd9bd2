//! Static keyword table and the category vocabulary used by search.

use unicode_segmentation::UnicodeSegmentation;

/// Categories a record can be posted under. Classifiers pick from this list.
pub const CATEGORIES: &[&str] = &[
	"agriculture-farming",
	"antiques",
	"art",
	"automobile",
	"books-publications",
	"childcare-family",
	"collectibles",
	"construction-renovation",
	"education-training",
	"electronics-gadgets",
	"entertainment-media",
	"events-entertainment",
	"fashion-apparel",
	"food-beverage",
	"gaming-recreation",
	"government-public",
	"health-beauty",
	"home-furniture",
	"insurance-services",
	"jobs",
	"jewelry-accessories",
	"legal-financial",
	"marketing-advertising",
	"memorabilia",
	"non-profit-charity",
	"pets",
	"professional-services",
	"raw-materials-industrial",
	"real-estate",
	"real-estate-services",
	"renewable-energy",
	"security-safety",
	"sneakers",
	"souvenir",
	"sports-outdoor",
	"technology",
	"thrift",
	"transportation-logistics",
	"travel-tourism",
	"vintage",
	"waste-management",
	"wedding-events",
	"other",
];

/// Many-to-one keyword table, `(keyword, category)`.
pub const KEYWORDS: &[(&str, &str)] = &[
	("car", "automobile"),
	("vehicle", "automobile"),
	("auto", "automobile"),
	("automobile", "automobile"),
	("bike", "automobile"),
	("motorcycle", "automobile"),
	("truck", "automobile"),
	("scooter", "automobile"),
	("bus", "automobile"),
	("van", "automobile"),
	("jacket", "thrift"),
	("clothing", "thrift"),
	("fashion", "thrift"),
	("dress", "thrift"),
	("shirt", "thrift"),
	("pants", "thrift"),
	("shoes", "thrift"),
	("accessories", "thrift"),
	("bag", "thrift"),
	("jewelry", "thrift"),
	("phone", "electronics-gadgets"),
	("laptop", "electronics-gadgets"),
	("computer", "electronics-gadgets"),
	("gadget", "electronics-gadgets"),
	("tech", "electronics-gadgets"),
	("mobile", "electronics-gadgets"),
	("tablet", "electronics-gadgets"),
	("camera", "electronics-gadgets"),
	("headphones", "electronics-gadgets"),
	("speaker", "electronics-gadgets"),
	("food", "food-beverage"),
	("catering", "food-beverage"),
	("restaurant", "food-beverage"),
	("meal", "food-beverage"),
	("cooking", "food-beverage"),
	("kitchen", "food-beverage"),
	("cafe", "food-beverage"),
	("bakery", "food-beverage"),
	("delivery", "food-beverage"),
	("job", "jobs"),
	("work", "jobs"),
	("employment", "jobs"),
	("career", "jobs"),
	("position", "jobs"),
	("hiring", "jobs"),
	("recruitment", "jobs"),
	("vacancy", "jobs"),
	("staff", "jobs"),
	("employee", "jobs"),
	("house", "real-estate"),
	("property", "real-estate"),
	("rent", "real-estate"),
	("buy", "real-estate"),
	("apartment", "real-estate"),
	("home", "real-estate"),
	("flat", "real-estate"),
	("villa", "real-estate"),
	("land", "real-estate"),
	("plot", "real-estate"),
	("materials", "raw-materials-industrial"),
	("industrial", "raw-materials-industrial"),
	("manufacturing", "raw-materials-industrial"),
	("supplies", "raw-materials-industrial"),
	("components", "raw-materials-industrial"),
	("parts", "raw-materials-industrial"),
	("equipment", "raw-materials-industrial"),
	("machinery", "raw-materials-industrial"),
	("tools", "raw-materials-industrial"),
	("hardware", "raw-materials-industrial"),
	("fuel", "raw-materials-industrial"),
	("oil", "raw-materials-industrial"),
	("crude oil", "raw-materials-industrial"),
	("petroleum", "raw-materials-industrial"),
	("diesel", "raw-materials-industrial"),
	("gas", "raw-materials-industrial"),
	("petrol", "raw-materials-industrial"),
	("chemicals", "raw-materials-industrial"),
	("steel", "raw-materials-industrial"),
	("metal", "raw-materials-industrial"),
	("plastic", "raw-materials-industrial"),
	("rubber", "raw-materials-industrial"),
	("cement", "raw-materials-industrial"),
	("lumber", "raw-materials-industrial"),
	("timber", "raw-materials-industrial"),
	("construction", "construction-renovation"),
	("building", "construction-renovation"),
	("contractor", "construction-renovation"),
	("renovation", "construction-renovation"),
	("repair", "construction-renovation"),
	("maintenance", "construction-renovation"),
	("plumbing", "construction-renovation"),
	("electrical", "construction-renovation"),
	("painting", "construction-renovation"),
	("roofing", "construction-renovation"),
	("healthcare", "health-beauty"),
	("medical", "health-beauty"),
	("doctor", "health-beauty"),
	("nurse", "health-beauty"),
	("hospital", "health-beauty"),
	("clinic", "health-beauty"),
	("pharmacy", "health-beauty"),
	("therapy", "health-beauty"),
	("wellness", "health-beauty"),
	("fitness", "health-beauty"),
	("education", "education-training"),
	("school", "education-training"),
	("college", "education-training"),
	("university", "education-training"),
	("tutoring", "education-training"),
	("training", "education-training"),
	("course", "education-training"),
	("teacher", "education-training"),
	("tuition", "education-training"),
	("learning", "education-training"),
	("events", "wedding-events"),
	("wedding", "wedding-events"),
	("party", "wedding-events"),
	("celebration", "wedding-events"),
	("function", "wedding-events"),
	("ceremony", "wedding-events"),
	("reception", "wedding-events"),
	("anniversary", "wedding-events"),
	("birthday", "wedding-events"),
	("festival", "wedding-events"),
	("waste", "waste-management"),
	("recycling", "waste-management"),
	("garbage", "waste-management"),
	("trash", "waste-management"),
	("disposal", "waste-management"),
	("cleaning", "waste-management"),
	("hygiene", "waste-management"),
	("sanitation", "waste-management"),
	("environment", "waste-management"),
	("service", "other"),
	("help", "other"),
	("support", "other"),
	("consultation", "other"),
	("assistance", "other"),
	("general", "other"),
];

/// Resolves a free-text query to a category through [`KEYWORDS`].
///
/// An exact match of the whole query wins. Otherwise the longest keyword that appears in the
/// query as whole words is used, ties going to table order. Substrings of words never match, so
/// "oil" does not hit "toilet".
pub fn category_for_query(query: &str) -> Option<&'static str> {
	let normalized = query.trim().to_lowercase();

	if normalized.is_empty() {
		return None;
	}

	if let Some((_, category)) = KEYWORDS.iter().find(|(keyword, _)| *keyword == normalized) {
		return Some(*category);
	}

	let words = normalized.unicode_words().collect::<Vec<_>>();
	let mut best: Option<(&str, &'static str)> = None;

	for (keyword, category) in KEYWORDS {
		let phrase = keyword.unicode_words().collect::<Vec<_>>();

		if !contains_phrase(&words, &phrase) {
			continue;
		}
		if best.is_none_or(|(current, _)| keyword.len() > current.len()) {
			best = Some((*keyword, *category));
		}
	}

	best.map(|(_, category)| category)
}

/// Human label for a category value, hyphens shown as spaces.
pub fn category_label(category: &str) -> String {
	category.replace('-', " ")
}

pub fn is_known_category(category: &str) -> bool {
	CATEGORIES.contains(&category)
}

fn contains_phrase(words: &[&str], phrase: &[&str]) -> bool {
	!phrase.is_empty() && words.windows(phrase.len()).any(|window| window == phrase)
}
