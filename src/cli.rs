use clap::{Args, Parser, Subcommand, ValueHint};
use std::path::PathBuf;

/// Flood impact on road networks (batch front end)
#[derive(Parser, Debug)]
#[command(name = "floodreach", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// JSON job config (threads, chunk size, aggregation and model tuning)
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Checkpoint log to use instead of `log.json` under the store root
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub checkpoint: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Maximum flood days of one raster under every road edge
    FloodDays(FloodDaysArgs),

    /// Maximum flood days per event raster, one edge column per event
    FloodEvents(FloodEventsArgs),

    /// Sum rasters onto their nearest road node
    NodeRaster(NodeRasterArgs),

    /// Attach facility points to their nearest road node
    LinkFacilities(LinkFacilitiesArgs),

    /// Sample an event raster under each facility into a `fid,values` CSV
    SampleFacilities(SampleFacilitiesArgs),

    /// Geodesic length of every road edge
    RoadLength(StoreArgs),

    /// 2SFCA supply ratios and accessibility per node
    Accessibility(AccessibilityArgs),
}

#[derive(Args, Debug)]
pub struct StoreArgs {
    /// Directory holding the `.gpkg` road stores
    #[arg(value_hint = ValueHint::DirPath)]
    pub stores: PathBuf,
}

#[derive(Args, Debug)]
pub struct FloodDaysArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Flood days raster
    #[arg(value_hint = ValueHint::FilePath)]
    pub raster: PathBuf,

    /// Edge column receiving the days
    #[arg(long, default_value = "affectDays")]
    pub column: String,

    /// Count every cell a polygon touches, not only center-inside cells
    #[arg(long)]
    pub all_touched: bool,
}

#[derive(Args, Debug)]
pub struct FloodEventsArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Directory with one sub-directory of event zip archives per country
    #[arg(value_hint = ValueHint::DirPath)]
    pub rasters: PathBuf,

    /// Directory the event rasters are decompressed into
    #[arg(value_hint = ValueHint::DirPath)]
    pub decompressed: PathBuf,
}

#[derive(Args, Debug)]
pub struct NodeRasterArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// `FIELD=RASTER` pairs; each raster is summed into the node column FIELD
    #[arg(short, long = "target", required = true, value_parser = parse_target)]
    pub targets: Vec<(String, PathBuf)>,

    /// Leave out cells farther than this from every node (raster units)
    #[arg(long)]
    pub max_distance: Option<f64>,

    /// Block edge length in cells
    #[arg(long)]
    pub block_size: Option<usize>,
}

#[derive(Args, Debug)]
pub struct LinkFacilitiesArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub facility: FacilityArgs,
}

#[derive(Args, Debug)]
pub struct SampleFacilitiesArgs {
    #[command(flatten)]
    pub facility: FacilityArgs,

    /// Event raster sampled under each facility
    #[arg(value_hint = ValueHint::FilePath)]
    pub raster: PathBuf,

    /// Output CSV, the input of `accessibility --affected`
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct FacilityArgs {
    /// Facility points: a `.gpkg` (with --layer) or a `.shp` (with --srs)
    #[arg(value_hint = ValueHint::FilePath)]
    pub facilities: PathBuf,

    /// Point layer of a GeoPackage source
    #[arg(long)]
    pub layer: Option<String>,

    /// Reference system of a shapefile source, e.g. EPSG:4326
    #[arg(long)]
    pub srs: Option<String>,
}

#[derive(Args, Debug)]
pub struct AccessibilityArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// CSV (`fid,values`) of facilities hit by the event; evaluates the post-event network
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub affected: Option<PathBuf>,

    /// Catchment size
    #[arg(long)]
    pub d0: Option<f64>,

    /// Decay function name
    #[arg(long)]
    pub decay: Option<String>,

    /// Node column holding the demand
    #[arg(long)]
    pub demand_field: Option<String>,
}

fn parse_target(s: &str) -> Result<(String, PathBuf), String> {
    let (field, raster) = s.split_once('=')
        .ok_or_else(|| format!("expected FIELD=RASTER, got `{s}`"))?;
    if field.is_empty() || raster.is_empty() {
        return Err(format!("expected FIELD=RASTER, got `{s}`"))
    }
    Ok((field.to_string(), PathBuf::from(raster)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_node_raster_targets() {
        let cli = Cli::try_parse_from([
            "floodreach", "-vv", "node-raster", "stores", "-t", "pop=pop.tif", "--target", "gdp=gdp.tif",
        ]).unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::NodeRaster(args) = cli.command else { panic!("wrong subcommand") };
        assert_eq!(args.targets, [("pop".to_string(), PathBuf::from("pop.tif")), ("gdp".to_string(), PathBuf::from("gdp.tif"))]);
        assert!(Cli::try_parse_from(["floodreach", "node-raster", "stores", "-t", "pop"]).is_err());
    }

    #[test]
    fn facility_flags_are_shared() {
        let cli = Cli::try_parse_from([
            "floodreach", "sample-facilities", "evcs.shp", "event.tif", "--srs", "EPSG:4326", "-o", "hit.csv",
        ]).unwrap();
        let Commands::SampleFacilities(args) = cli.command else { panic!("wrong subcommand") };
        assert_eq!(args.facility.facilities, PathBuf::from("evcs.shp"));
        assert_eq!(args.facility.srs.as_deref(), Some("EPSG:4326"));
        assert_eq!(args.output, PathBuf::from("hit.csv"));

        let cli = Cli::try_parse_from(["floodreach", "link-facilities", "stores", "evcs.gpkg", "--layer", "evcs"]).unwrap();
        let Commands::LinkFacilities(args) = cli.command else { panic!("wrong subcommand") };
        assert_eq!(args.facility.layer.as_deref(), Some("evcs"));
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from(["floodreach", "road-length", "stores", "--config", "job.json"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("job.json")));
        assert!(matches!(cli.command, Commands::RoadLength(_)));
    }
}
