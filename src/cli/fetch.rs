//! One-shot page fetch for inspecting upstream responses

use crate::config::Config;
use crate::upstream::{BybitClient, PageFetcher};
use clap::Args;
use tokio_util::sync::CancellationToken;

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// 1-based page number to request
    #[arg(short, long, default_value_t = 1)]
    pub page: u32,
}

impl FetchArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let client = BybitClient::new(config.upstream.clone());
        let cancel = CancellationToken::new();

        let listings = client.fetch_page(self.page, &cancel).await?;

        println!("{} listings on page {}", listings.len(), self.page);
        for (index, listing) in listings.iter().enumerate() {
            println!(
                "{:>3}. {}  {}  [{} .. {}]",
                index + 1,
                listing.nick_name,
                listing.price,
                listing.min_amount,
                listing.max_amount
            );
        }

        Ok(())
    }
}
