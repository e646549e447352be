use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use internship_adapters::{format_currency, parse_stipend_amount};
use internship_core::Internship;
use internship_listing::{FilterStore, ListingCache, ListingConfig, ListingQuery, SortOption};

mod telemetry;

#[derive(Debug, Parser)]
#[command(name = "internship-cli")]
#[command(about = "Internship Finder command-line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the JSON API.
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print one page of internships using the saved filters.
    List {
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long)]
        per_page: Option<usize>,
        #[arg(long)]
        query: Option<String>,
        /// newest, oldest, stipend_high_to_low, stipend_low_to_high or deadline_nearest
        #[arg(long)]
        sort: Option<SortOption>,
    },
    /// Print the available profile, location and duration filters.
    Options,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init()?;
    let cli = Cli::parse();
    let config = ListingConfig::from_env();

    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => {
            let port = port.unwrap_or_else(internship_web::web_port_from_env);
            internship_web::serve(&config, port).await?;
        }
        Commands::List {
            page,
            per_page,
            query,
            sort,
        } => {
            let cache = ListingCache::new(config.build_source()?);
            let filters = FilterStore::load(config.open_store());
            let listing_query = ListingQuery {
                filters: filters.get().clone(),
                search: query.unwrap_or_default(),
                sort,
            };
            let result = cache
                .query_page(&listing_query, page, per_page.unwrap_or(config.page_size))
                .await
                .context("listing internships")?;
            println!(
                "page {} ({} per page): {} of {} internships",
                result.page,
                result.page_size,
                result.items.len(),
                result.total
            );
            for record in &result.items {
                println!("{}", summary_line(record));
            }
        }
        Commands::Options => {
            let cache = ListingCache::new(config.build_source()?);
            let options = cache.filter_options().await.context("loading filter options")?;
            println!("profiles: {}", options.profiles.join(" | "));
            println!("locations: {}", options.locations.join(" | "));
            println!("durations: {}", options.durations.join(" | "));
        }
    }

    Ok(())
}

fn summary_line(record: &Internship) -> String {
    let stipend = format_currency(parse_stipend_amount(&record.stipend.amount), "₹");
    let mut line = format!(
        "{}\t{}\t{}\t{}/{}",
        record.id, record.title, record.company, stipend, record.stipend.period
    );
    let deadline = record.deadline_status.label();
    if !deadline.is_empty() {
        line.push('\t');
        line.push_str(&deadline);
    }
    if record.is_remote {
        line.push_str("\tremote");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use internship_core::{DeadlineStatus, Stipend};

    #[test]
    fn summary_line_formats_stipend_and_deadline() {
        let record = Internship {
            id: "7".to_string(),
            title: "Rust Intern".to_string(),
            company: "Ferris Co".to_string(),
            stipend: Stipend {
                amount: "₹ 15,000".to_string(),
                period: "month".to_string(),
            },
            is_remote: true,
            deadline_status: DeadlineStatus::Upcoming(1),
            ..Internship::default()
        };
        assert_eq!(
            summary_line(&record),
            "7\tRust Intern\tFerris Co\t₹15K/month\t1 day left\tremote"
        );
    }

    #[test]
    fn list_arguments_parse_sort_options() {
        let cli = Cli::try_parse_from(["internship-cli", "list", "--page", "2", "--sort", "newest"]).unwrap();
        match cli.command {
            Some(Commands::List { page, sort, .. }) => {
                assert_eq!(page, 2);
                assert_eq!(sort, Some(SortOption::Newest));
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(Cli::try_parse_from(["internship-cli", "list", "--sort", "cheapest"]).is_err());
    }
}
