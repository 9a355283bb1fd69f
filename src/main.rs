/// hfprop: command-line front end for the propagation service.
///
/// Usage:
///   hfprop band TXLAT=40 TXLNG=-75 RXLAT=51.5 RXLNG=0 UTC=12
///   hfprop rel  TXLAT=40 TXLNG=-75 MHZ=14 WIDTH=660 HEIGHT=330
///   hfprop muf  TXLAT=40 TXLNG=-75
///   hfprop toa  TXLAT=40 TXLNG=-75 MHZ=21
///   hfprop dedx TXLAT=40 TXLNG=-75 RXLAT=51.5 RXLNG=0
///   hfprop point TXLAT=40 TXLNG=-75 RXLAT=51.5 RXLNG=0 BAND=20m
///
/// A single `?A=1&B=2` query string is accepted in place of the KEY=VALUE
/// list. Text responses and map payloads (day then night) go to stdout, and
/// only after the whole response has been built. Diagnostics go to stderr.

use std::io::{self, Write};
use std::process::ExitCode;

use hfprop_service::config::ServiceConfig;
use hfprop_service::logging::{self, DataSource};
use hfprop_service::model::ServiceError;
use hfprop_service::propagation::path::snr_label;
use hfprop_service::query::Query;
use hfprop_service::render::MapKind;
use hfprop_service::service::PropagationService;

const USAGE: &str = "usage: hfprop <band|rel|muf|toa|dedx|point> [KEY=VALUE ...]";

fn main() -> ExitCode {
    let config = match ServiceConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("hfprop: {}", e);
            return ExitCode::FAILURE;
        }
    };
    logging::init_logger(
        config.log_level(),
        config.logging.file.as_deref(),
        config.logging.console_timestamps,
    );

    let mut args = std::env::args().skip(1);
    let Some(endpoint) = args.next() else {
        eprintln!("{}", USAGE);
        return ExitCode::FAILURE;
    };
    let rest: Vec<String> = args.collect();

    match run(&config, &endpoint, &rest) {
        Ok(body) => {
            let mut stdout = io::stdout().lock();
            if stdout.write_all(&body).and_then(|_| stdout.flush()).is_err() {
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            logging::error(DataSource::System, None, &format!("{} request failed: {}", endpoint, e));
            eprintln!("hfprop: request failed");
            ExitCode::FAILURE
        }
    }
}

fn parse_query(args: &[String]) -> Result<Query, ServiceError> {
    match args {
        [single] if !single.contains('=') || single.contains('&') || single.starts_with('?') => {
            Query::from_query_string(single)
        }
        _ => Query::from_args(args),
    }
}

fn run(config: &ServiceConfig, endpoint: &str, args: &[String]) -> Result<Vec<u8>, ServiceError> {
    let query = parse_query(args)?;
    let service = PropagationService::from_config(config)?;

    let map_kind = match endpoint {
        "band" => return Ok(service.band_conditions(&query)?.into_bytes()),
        "dedx" => return Ok(service.band_summary(&query)?.into_bytes()),
        "point" => {
            let p = service.point(&query)?;
            let line = format!(
                "{:.2},{:.2},{},{:.0},{:.0}\n",
                p.muf_mhz,
                p.reliability,
                snr_label(p.reliability * 100.0),
                p.distance_km,
                p.bearing_deg
            );
            return Ok(line.into_bytes());
        }
        "rel" => MapKind::Reliability,
        "muf" => MapKind::Muf,
        "toa" => MapKind::TakeoffAngle,
        other => {
            return Err(ServiceError::InvalidParameter {
                name: "endpoint".to_string(),
                value: other.to_string(),
            });
        }
    };

    let map = service.map(&query, map_kind)?;
    Ok(map.day_night().concat())
}
