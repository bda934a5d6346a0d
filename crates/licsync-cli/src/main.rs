use licsync_cli::{build_cli, execute, logging};
use licsync_core::LicsyncError;

#[tokio::main]
async fn main() {
    let matches = build_cli().get_matches();
    logging::init(matches.get_flag("verbose"));

    if let Err(e) = execute(&matches).await {
        eprintln!("error: {e:#}");
        if let Some(setup) = e.downcast_ref::<LicsyncError>() {
            eprintln!();
            eprintln!("{}", setup.suggested_fix());
        }
        std::process::exit(1);
    }
}
