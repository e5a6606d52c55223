use anyhow::{Context, Result, bail};
use arcgis_mapserver::{
    ClientConfig, Envelope, LayerId, MapServerClient, OutFields, Query, SpatialFilter,
};
use clap::{Parser, Subcommand};
use osmp::{DEFAULT_ROOT, Osmp, OsmpFeature, OsmpService, TrailId};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod output;

use output::{collect, write_feature_collection};

#[derive(Parser, Debug)]
#[command(
    name = "osmp-query",
    author,
    version,
    about = "Query Boulder OSMP MapServers and write GeoJSON",
    long_about = "Runs attribute and bounding box queries against the City of Boulder \
                  Open Space and Mountain Parks ArcGIS MapServers, or looks up single \
                  trails, junctions and access points by id.\n\n\
                  Features are written as a GeoJSON FeatureCollection in WGS84."
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// MapServer to query (Trails, TrailsNEW, TrailJunctions, ...)
    #[arg(short, long, global = true)]
    service: Option<OsmpService>,

    /// Full MapServer URL, overrides --service
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Directory holding the OSMP MapServers
    #[arg(long, global = true, default_value = DEFAULT_ROOT)]
    root: String,

    /// JSON client configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<f64>,

    /// Largest page requested from the server
    #[arg(long, global = true)]
    page_size: Option<u32>,

    /// Attempts per request, retrying connection failures and timeouts
    #[arg(long, global = true)]
    retries: Option<u32>,

    /// Output GeoJSON file (stdout if omitted)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Verbose output (show debug messages)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the layers of a MapServer
    Layers,

    /// Query features from one layer
    Query {
        /// Layer id (config default_layer, then 0)
        #[arg(short, long)]
        layer: Option<LayerId>,

        /// SQL where clause
        #[arg(short, long = "where")]
        where_clause: Option<String>,

        /// Comma separated output fields, or * for all
        #[arg(short, long, default_value = "*")]
        fields: String,

        /// Bounding box filter in WGS84: xmin,ymin,xmax,ymax
        #[arg(long, value_parser = parse_bbox, allow_hyphen_values = true)]
        bbox: Option<Envelope>,

        /// Comma separated ORDER BY fields
        #[arg(long, value_delimiter = ',')]
        order_by: Vec<String>,

        /// Features per page (the layer's page size if omitted)
        #[arg(long)]
        limit: Option<u32>,

        /// Offset of the first feature
        #[arg(long, default_value_t = 0)]
        offset: u32,

        /// Follow every page instead of returning only the first
        #[arg(long)]
        all: bool,

        /// Skip geometries
        #[arg(long)]
        no_geometry: bool,
    },

    /// Look up a trail by SEGMENTID (ddd-ddd-ddd) or GlobalID
    Trail { id: String },

    /// Look up a trail junction by JUNCTIONID
    Junction { id: String },

    /// Look up a trailhead or access point by ACCESSID
    Access { id: String },
}

fn parse_bbox(s: &str) -> Result<Envelope, String> {
    let values: Vec<f64> = s
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid coordinate: {e}"))?;

    if let Some(v) = values.iter().find(|v| !v.is_finite()) {
        return Err(format!("coordinate must be finite, got {v}"));
    }

    match values[..] {
        [xmin, ymin, xmax, ymax] => Ok(Envelope::new(xmin, ymin, xmax, ymax)),
        _ => Err(format!("expected 4 values, got {}", values.len())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so GeoJSON on stdout stays clean.
    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    let config = load_config(&args)?;

    match &args.command {
        Command::Layers => list_layers(&args, config).await,
        Command::Query {
            layer,
            where_clause,
            fields,
            bbox,
            order_by,
            limit,
            offset,
            all,
            no_geometry,
        } => {
            let client = client(&args, config)?;
            let layer = layer.or(client.config().default_layer).unwrap_or_default();
            // query_all fits the limit to the layer itself.
            let limit = match limit {
                Some(limit) => *limit,
                None if *all => client.config().page_size,
                None => client
                    .config()
                    .retry
                    .run(|| client.layer_page_size(layer))
                    .await
                    .with_context(|| format!("Failed to fetch layer {layer}"))?,
            };
            let mut builder = Query::builder(layer)
                .limit(limit)
                .offset(*offset)
                .return_geometry(!no_geometry)
                .output_fields(OutFields::from(fields.as_str()))
                .order_by(order_by.iter().cloned());

            if let Some(clause) = where_clause {
                builder = builder.attribute_filter(clause.clone());
            }
            if let Some(bbox) = bbox {
                builder = builder.spatial_filter(SpatialFilter::intersects(*bbox).with_in_sr(4326));
            }
            let query = builder.build().context("Invalid query")?;

            run_query(&args, &client, &query, *all).await
        }
        Command::Trail { id } => {
            let osmp = Osmp::with_config(&args.root, config)?;
            let trail = osmp.trail(&TrailId::parse(id)).await?;
            write_lookup(&args, "Trail", id, trail)
        }
        Command::Junction { id } => {
            let osmp = Osmp::with_config(&args.root, config)?;
            let junction = osmp.junction(id).await?;
            write_lookup(&args, "Junction", id, junction)
        }
        Command::Access { id } => {
            let osmp = Osmp::with_config(&args.root, config)?;
            let access = osmp.access(id).await?;
            write_lookup(&args, "Access point", id, access)
        }
    }
}

fn load_config(args: &Args) -> Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ClientConfig::default(),
    };

    if let Some(timeout) = args.timeout {
        config.timeout = Duration::try_from_secs_f64(timeout).context("Invalid --timeout")?;
    }
    if let Some(page_size) = args.page_size {
        config.page_size = page_size;
    }
    if let Some(retries) = args.retries {
        config.retry.max_attempts = retries;
    }

    Ok(config)
}

/// --base-url, then --service, then the config file's base_url, then Trails.
fn client(args: &Args, mut config: ClientConfig) -> Result<MapServerClient> {
    if let Some(url) = &args.base_url {
        config.base_url = url.clone();
    } else if let Some(service) = args.service {
        config.base_url = service.url(&args.root);
    } else if config.base_url.is_empty() {
        config.base_url = OsmpService::Trails.url(&args.root);
    }

    tracing::info!("MapServer: {}", config.base_url);
    MapServerClient::new(config).context("Failed to create MapServer client")
}

async fn list_layers(args: &Args, config: ClientConfig) -> Result<()> {
    let client = client(args, config)?;
    let info = client
        .config()
        .retry
        .run(|| client.service_info())
        .await
        .context("Failed to fetch service info")?;

    if let Some(name) = &info.map_name {
        println!("{name}");
    }
    for layer in &info.layers {
        let geometry = layer
            .geometry()
            .map_or_else(|| "-".to_string(), |g| g.to_string());
        println!("{:>4}  {:<20}  {}", layer.id.get(), geometry, layer.name);
    }

    Ok(())
}

async fn run_query(
    args: &Args,
    client: &MapServerClient,
    query: &Query,
    all: bool,
) -> Result<()> {
    let retry = &client.config().retry;
    let features = if all {
        retry.run(|| client.query_all(query)).await
    } else {
        retry.run(|| client.query(query)).await
    }
    .with_context(|| format!("Query on layer {} failed", query.layer_id()))?;

    tracing::info!("Received {} features", features.len());
    if let Some(next) = features.next_offset() {
        tracing::info!("More features available, continue with --offset {next} or use --all");
    }

    write_feature_collection(features.to_feature_collection(), args.output.as_deref())
}

fn write_lookup(args: &Args, what: &str, id: &str, feature: Option<OsmpFeature>) -> Result<()> {
    let Some(feature) = feature else {
        bail!("{what} {id} not found");
    };

    if let Some(name) = feature.name() {
        tracing::info!("{what} {id}: {name}");
    }
    if let Some(coords) = feature.latlon_coords() {
        tracing::debug!("{what} {id}: {} coordinates, first {:?}", coords.len(), coords.first());
    }

    write_feature_collection(
        collect([feature.feature().to_geojson()]),
        args.output.as_deref(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bbox() {
        let bbox = parse_bbox("-105.3, 39.9,-105.2,40.1").unwrap();
        assert_eq!(bbox, Envelope::new(-105.3, 39.9, -105.2, 40.1));
        assert!(parse_bbox("-105.3,39.9,-105.2").is_err());
        assert!(parse_bbox("a,b,c,d").is_err());
        assert!(parse_bbox("NaN,39.9,-105.2,40.1").is_err());
        assert!(parse_bbox("-105.3,39.9,inf,40.1").is_err());
        assert!(parse_bbox("-105.3,-infinity,-105.2,40.1").is_err());
    }

    #[test]
    fn test_query_args() {
        let args = Args::try_parse_from([
            "osmp-query",
            "query",
            "--layer",
            "4",
            "--where",
            "TRAILNAME LIKE 'Mesa%'",
            "--fields",
            "SEGMENTID,TRAILNAME",
            "--bbox",
            "-105.3,39.9,-105.2,40.1",
            "--all",
            "-s",
            "TrailsNEW",
        ])
        .unwrap();

        assert_eq!(args.service, Some(OsmpService::TrailsNew));
        match args.command {
            Command::Query {
                layer, fields, all, bbox, ..
            } => {
                assert_eq!(layer, Some(LayerId::new(4)));
                assert_eq!(
                    OutFields::from(fields.as_str()),
                    OutFields::list(["SEGMENTID", "TRAILNAME"])
                );
                assert!(all);
                assert!(bbox.is_some());
            }
            other => panic!("Expected query command, got {other:?}"),
        }
    }

    #[test]
    fn test_fields_default_to_all() {
        let args = Args::try_parse_from(["osmp-query", "query"]).unwrap();
        match args.command {
            Command::Query { fields, limit, .. } => {
                assert_eq!(OutFields::from(fields.as_str()), OutFields::All);
                assert_eq!(limit, None);
            }
            other => panic!("Expected query command, got {other:?}"),
        }
    }

    #[test]
    fn test_client_url_precedence() {
        let args = Args::try_parse_from(["osmp-query", "layers", "--service", "DogRegs"]).unwrap();
        let mapserver = client(&args, ClientConfig::new("https://example.com/Other/MapServer/")).unwrap();
        assert_eq!(mapserver.base_url().as_str(), OsmpService::DogRegs.url(DEFAULT_ROOT));

        let args = Args::try_parse_from(["osmp-query", "layers"]).unwrap();
        let mapserver = client(&args, ClientConfig::new("https://example.com/Other/MapServer/")).unwrap();
        assert_eq!(mapserver.base_url().as_str(), "https://example.com/Other/MapServer/");

        let mapserver = client(&args, ClientConfig::default()).unwrap();
        assert_eq!(mapserver.base_url().as_str(), OsmpService::Trails.url(DEFAULT_ROOT));
    }

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::try_parse_from([
            "osmp-query",
            "layers",
            "--timeout",
            "2.5",
            "--page-size",
            "500",
            "--retries",
            "5",
        ])
        .unwrap();
        let config = load_config(&args).unwrap();

        assert_eq!(config.timeout, Duration::from_millis(2500));
        assert_eq!(config.page_size, 500);
        assert_eq!(config.retry.max_attempts, 5);
    }
}
