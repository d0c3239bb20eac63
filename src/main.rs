use anyhow::Result;
use clap::Parser;

use floodreach::cli::{Cli, Commands};
use floodreach::commands::{accessibility, flood, link_facilities, node_raster, road_length, sample_facilities};

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let mut builder = pretty_env_logger::formatted_builder();
    match std::env::var("RUST_LOG") {
        Ok(filter) => builder.parse_filters(&filter),
        Err(_) => builder.parse_filters(default),
    };
    builder.init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match &cli.command {
        Commands::FloodDays(args) => flood::days(&cli, args),
        Commands::FloodEvents(args) => flood::events(&cli, args),
        Commands::NodeRaster(args) => node_raster::run(&cli, args),
        Commands::LinkFacilities(args) => link_facilities::run(&cli, args),
        Commands::SampleFacilities(args) => sample_facilities::run(&cli, args),
        Commands::RoadLength(args) => road_length::run(&cli, args),
        Commands::Accessibility(args) => accessibility::run(&cli, args),
    }
}
