use clap::Parser;

use catalog_replay::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = Args::parse();

	catalog_replay::run(args).await
}
