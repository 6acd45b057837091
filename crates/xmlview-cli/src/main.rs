mod cli;
mod commands;

use cli::{
    CheckParams, ExtractParams, QueryParams, TransformParams, ValidateParams, build_cli,
};

/// Diagnostics go to stderr; `XMLVIEW_LOG` overrides the default `warn` filter.
fn setup_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("XMLVIEW_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn main() {
    setup_tracing();
    let matches = build_cli().get_matches();

    match matches.subcommand() {
        Some(("query", m)) => {
            let params = QueryParams::from_matches(m);
            commands::query::run(params.into());
        }
        Some(("transform", m)) => {
            let params = TransformParams::from_matches(m);
            commands::transform::run(params.into());
        }
        Some(("validate", m)) => {
            let params = ValidateParams::from_matches(m);
            commands::validate::run(params.into());
        }
        Some(("check", m)) => {
            let params = CheckParams::from_matches(m);
            commands::check::run(params.into());
        }
        Some(("extract", m)) => {
            let params = ExtractParams::from_matches(m);
            commands::extract::run(params.into());
        }
        _ => unreachable!("clap should have caught this"),
    }
}
