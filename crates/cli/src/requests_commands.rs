use {
    anyhow::Result,
    clap::Subcommand,
    prayerwall_config::PrayerwallConfig,
    prayerwall_store::{PrayerRequest, PrayerStore},
};

#[derive(Subcommand)]
pub enum RequestsAction {
    /// Print the most recent requests, newest first.
    List {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

pub async fn handle_requests(config: &PrayerwallConfig, action: RequestsAction) -> Result<()> {
    match action {
        RequestsAction::List { limit } => list(&config.database.url, limit).await,
    }
}

async fn list(url: &str, limit: u32) -> Result<()> {
    let store = PrayerStore::connect(url).await?;
    let requests = store.list(limit).await?;
    if requests.is_empty() {
        println!("No prayer requests yet.");
    }
    for req in &requests {
        println!("{}", format_line(req));
    }
    Ok(())
}

fn format_line(req: &PrayerRequest) -> String {
    format!("#{} [{}] {}", req.id, req.created_at_rfc3339(), req.content)
}
