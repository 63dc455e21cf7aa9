use actix_web::{web, App, HttpServer};
use clap::Parser;
use std::sync::Arc;

mod api;
mod cli;
mod error;
mod metrics;
mod models;
mod services;
mod state;
mod supervisor;

use api::AppState;
use cli::CommandArgs;
use services::SystemPortInspector;
use supervisor::Supervisor;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = CommandArgs::parse();
    let bind_address = format!("{}:{}", args.address, args.port);

    let supervisor = Supervisor::new(args.settings(), Arc::new(SystemPortInspector::new()));

    let initial = supervisor.check_all();
    for (name, status) in &initial {
        log::info!("  {:<16} {:?}", name, status);
    }

    if supervisor.start_monitor(args.monitor_interval()) {
        log::info!("resource monitor running every {}s", args.monitor_interval().as_secs());
    }

    print_banner(&args);

    let state = AppState::new(supervisor.clone(), args.request_timeout());
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .configure(api::configure)
    })
    .bind(&bind_address)?
    .run()
    .await;

    supervisor.stop_monitor();
    log::info!("supervisor shut down");
    server
}

fn print_banner(args: &CommandArgs) {
    println!("╔═══════════════════════════════════════════════════════════╗");
    println!("║      Local Supervisor v{:<35}║", env!("CARGO_PKG_VERSION"));
    println!("║      Service lifecycle, port conflicts, resources         ║");
    println!("╚═══════════════════════════════════════════════════════════╝");
    println!();
    println!("🚀 Server starting on http://{}:{}", args.address, args.port);
    println!("📁 Data directory: {}", args.data_dir.display());
    println!();
    println!("📋 Available endpoints:");
    println!("  GET    /api/services                  - List services");
    println!("  POST   /api/services/register         - Register a service");
    println!("  DELETE /api/services/{{name}}           - Unregister a service");
    println!("  GET    /api/services/{{name}}/status    - Check one service");
    println!("  POST   /api/services/{{name}}/start     - Start (?wait=&timeout=)");
    println!("  POST   /api/services/{{name}}/stop      - Stop");
    println!("  POST   /api/services/{{name}}/restart   - Restart");
    println!("  POST   /api/services/{{name}}/kill      - Free the service's port");
    println!("  GET    /api/conflicts                 - List port conflicts");
    println!("  POST   /api/conflicts/heal            - Kill conflicting occupants");
    println!("  POST   /api/processes/{{pid}}/kill      - Kill a process (?force=)");
    println!("  GET    /api/ports/available           - Find a free port (?start=)");
    println!("  GET    /api/resources[/history]       - Host resources");
    println!("  POST   /api/monitor/start|stop        - Toggle the resource monitor");
    println!("  GET    /api/operations[/summary|/{{id}}] - Background operations");
    println!("  GET    /api/dashboard                 - Everything at once");
    println!("  GET    /api/events                    - Event log (?limit=&service=)");
    println!("  GET    /metrics                       - Prometheus metrics");
    println!("  GET    /health                        - Health check");
    println!("═══════════════════════════════════════════════════════════");
}
