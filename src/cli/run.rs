//! Run command implementation

use crate::config::Config;
use crate::poll::PollController;
use crate::render;
use crate::upstream::BybitClient;
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Render a single refresh cycle and exit
    #[arg(long)]
    pub once: bool,
}

impl RunArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let client = BybitClient::new(config.upstream.clone());
        let controller = PollController::new(client, config.poll.clone());
        let mut snapshots = controller.subscribe();
        let handle = controller.handle();
        let poll_task = tokio::spawn(controller.run());

        // Enter re-runs the fetch after a failure
        let mut input_lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = snapshots.borrow_and_update().clone();
                    if !self.once {
                        render::clear_terminal();
                    }
                    println!("{}", render::render_snapshot(&snapshot, config.poll.refresh_interval_secs));

                    if self.once && !snapshot.loading {
                        handle.shutdown();
                        break;
                    }
                }
                Ok(Some(_)) = input_lines.next_line() => {
                    handle.retry();
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received shutdown signal");
                    handle.shutdown();
                    break;
                }
            }
        }

        let _ = poll_task.await;
        Ok(())
    }
}
