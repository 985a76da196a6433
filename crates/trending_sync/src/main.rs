#[macro_use]
extern crate tracing;

mod collector;
mod config;
mod error;
mod model;
mod quota;
mod ranking;
mod report;
mod sync;
mod utils;
mod workflow;
mod youtube;

use clap::Parser;

use crate::config::Args;
use crate::utils::init_logger;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logger(&args.log_level);
    if let Err(e) = workflow::run(args).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
