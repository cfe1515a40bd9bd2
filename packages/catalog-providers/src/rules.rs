//! Offline classifier built from per-category word patterns.

use color_eyre::Result;
use regex::Regex;

use crate::{Classification, is_candidate};

const GROUP_WEIGHT: f32 = 0.3;
const MAX_ALTERNATIVES: usize = 2;

/// Pattern groups per category. Each group is a word alternation matched on word boundaries.
const PATTERN_GROUPS: &[(&str, &[&str])] = &[
	("agriculture-farming", &[
		"agriculture|agricultural|farming|farm|farms|farmer|farmers|crop|crops|harvest",
		"livestock|cattle|cow|cows|goat|goats|poultry|chicken|chickens",
		"seed|seeds|fertilizer|fertilizers|pesticide|pesticides|irrigation|tractor|tractors",
	]),
	("art", &[
		"art|arts|artwork|painting|paintings|sculpture|sculptures|artist|artists",
		"drawing|drawings|sketch|sketches|canvas|gallery|exhibition",
	]),
	("automobile", &[
		"car|cars|vehicle|vehicles|auto|automobile|bike|bikes|motorcycle|motorcycles|truck|trucks|scooter|scooters|bus|van|vans",
		"engine|motor|brake|brakes|tire|tires|tyre|tyres|wheel|wheels",
		"garage|mechanic|registration",
	]),
	("books-publications", &[
		"book|books|novel|novels|literature|author|authors|publisher|publishers",
		"textbook|textbooks|library|fiction|biography",
		"publication|publications|magazine|magazines|journal|journals",
	]),
	("construction-renovation", &[
		"construction|building|contractor|contractors|renovation|renovations",
		"plumbing|plumber|electrician|painter|roofing|roofer",
		"flooring|tiling|carpentry|carpenter|masonry|mason|welding|welder",
	]),
	("education-training", &[
		"education|school|schools|college|colleges|university|universities",
		"teacher|teachers|tutor|tutors|tutoring|course|courses|class|classes|lesson|lessons",
		"student|students|academic|exam|exams",
	]),
	("electronics-gadgets", &[
		"phone|phones|mobile|smartphone|iphone|android",
		"laptop|laptops|computer|computers|pc|macbook|desktop|monitor|monitors|keyboard",
		"tablet|tablets|ipad|kindle|camera|cameras|headphones|speaker|speakers",
	]),
	("fashion-apparel", &[
		"fashion|apparel|clothing|clothes|outfit|outfits",
		"designer|boutique|couture",
		"dress|dresses|shirt|shirts|pants|trousers|jeans|jacket|jackets|coat|coats",
	]),
	("food-beverage", &[
		"food|meal|meals|restaurant|restaurants|cafe|cafes|coffee|tea|drink|drinks",
		"cooking|chef|cook|kitchen|recipe|recipes|spices",
		"catering|caterer|tiffin|bakery",
	]),
	("health-beauty", &[
		"health|healthcare|medical|medicine|doctor|doctors|nurse|nurses",
		"hospital|hospitals|clinic|clinics|pharmacy|therapist|therapy",
		"wellness|fitness|gym|salon|spa|skincare|makeup",
	]),
	("home-furniture", &[
		"furniture|furnishings|decor|interior|household",
		"appliance|appliances",
		"sofa|sofas|chair|chairs|table|tables|bed|beds|wardrobe|wardrobes|cabinet|cabinets",
	]),
	("jobs", &[
		"job|jobs|work|employment|career|careers|position|positions|hiring|recruitment",
		"employee|employees|staff|worker|workers|freelancer|freelance",
		"internship|intern|vacancy|vacancies",
	]),
	("pets", &[
		"pet|pets|dog|dogs|puppy|puppies|cat|cats|kitten|kittens|veterinary|vet",
		"pet care|pet supplies|pet food|pet grooming",
	]),
	("raw-materials-industrial", &[
		"fuel|oil|crude|petroleum|diesel|gas|petrol|chemicals|chemical|steel|metal|metals",
		"plastic|plastics|rubber|cement|concrete|lumber|timber|materials",
		"industrial|manufacturing|factory|factories|machinery|equipment",
	]),
	("real-estate", &[
		"house|houses|home|homes|property|properties|apartment|apartments|flat|flats",
		"rent|rental|renting|lease|leasing",
		"land|plot|plots|villa|villas|bhk",
	]),
	("sneakers", &[
		"sneaker|sneakers|footwear|trainers",
		"running shoes|sports shoes|athletic shoes|sneakerhead",
	]),
	("travel-tourism", &[
		"travel|tour|tours|tourism|trip|trips|holiday|vacation",
		"hotel|hotels|flight|flights|ticket|tickets|visa",
	]),
	("wedding-events", &[
		"wedding|weddings|marriage|bride|groom|ceremony|reception",
		"engagement|bridal|mehendi|sangeet",
		"event|events|party|parties|celebration|celebrations",
	]),
	("waste-management", &[
		"waste|recycling|recycle|garbage|trash|scrap",
		"disposal|sanitation|hygiene|cleaning",
	]),
];

struct CategoryPatterns {
	category: &'static str,
	groups: Vec<Regex>,
}

/// Scores each category by how many of its pattern groups hit the query.
pub struct RuleClassifier {
	table: Vec<CategoryPatterns>,
}
impl RuleClassifier {
	pub fn new() -> Result<Self> {
		let mut table = Vec::with_capacity(PATTERN_GROUPS.len());

		for (category, groups) in PATTERN_GROUPS {
			let groups = groups
				.iter()
				.map(|group| Regex::new(&format!(r"\b(?:{group})\b")))
				.collect::<Result<Vec<_>, _>>()?;

			table.push(CategoryPatterns { category: *category, groups });
		}

		Ok(Self { table })
	}

	pub fn categories(&self) -> impl Iterator<Item = &'static str> + '_ {
		self.table.iter().map(|entry| entry.category)
	}

	/// Returns `None` when no group of any allowed category matches.
	pub fn classify(&self, query: &str, candidates: &[&str]) -> Option<Classification> {
		let query = query.trim().to_lowercase();

		if query.is_empty() {
			return None;
		}

		let mut scored = self
			.table
			.iter()
			.filter(|entry| is_candidate(entry.category, candidates))
			.filter_map(|entry| {
				let hits = entry.groups.iter().filter(|group| group.is_match(&query)).count();

				(hits > 0).then(|| (entry.category, hits, (hits as f32 * GROUP_WEIGHT).min(1.0)))
			})
			.collect::<Vec<_>>();

		// Stable, so equal scores keep table order.
		scored.sort_by(|a, b| b.2.total_cmp(&a.2));

		let (category, hits, confidence) = *scored.first()?;
		let alternatives = scored
			.iter()
			.skip(1)
			.take(MAX_ALTERNATIVES)
			.map(|(category, _, _)| category.to_string())
			.collect();

		Some(Classification {
			category: category.to_string(),
			confidence,
			reasoning: format!("Matched {hits} pattern group(s) for {category}."),
			alternatives,
		})
	}
}
