use anyhow::Result;
use chrono::Utc;
use metric_finder::{
    memory_store, tier_table_name, CacheReader, FinderConfig, Finder, MemPointCache, MemStore,
    MultiReader, Node, Reader, RetentionTier,
};
use std::{path::PathBuf, sync::Arc};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

fn setup_logging() {
    let filter = EnvFilter::from_default_env()
        .add_directive("metric_finder_example=info".parse().unwrap())
        .add_directive("metric_finder=info".parse().unwrap());

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .try_init();
}

const HOSTS: [&str; 3] = ["web01", "web02", "db01"];

fn retentions() -> Vec<RetentionTier> {
    vec![
        RetentionTier::new(60, 1440),
        RetentionTier::new(300, 2016),
        RetentionTier::new(3600, 8760),
    ]
}

/// Builds a small tree with a day of minutely and a week of five-minute data
/// per host.
fn seed_store(config: &FinderConfig, now: i64) -> MemStore {
    let mut store = memory_store(config);
    let tiers = retentions();
    let fine = config.table_name(&tier_table_name(&tiers[0], &tiers));
    let medium = config.table_name(&tier_table_name(&tiers[1], &tiers));

    for (h, host) in HOSTS.iter().enumerate() {
        for metric in ["cpu", "load"] {
            let path = format!("servers.{host}.{metric}");
            let method = if metric == "load" { "max" } else { "avg" };
            let row_id = store.add_leaf(&path, &tiers, method);

            let now = now - now.rem_euclid(60);
            for i in 0..1440 {
                let ts = now - 86_400 + i * 60;
                store.put_sample(&fine, &row_id, ts, (h * 10) as f64 + (i % 60) as f64);
            }
            for i in 0..2016 {
                let ts = now - 86_400 - 7 * 86_400 + i * 300;
                store.put_sample(&medium, &row_id, ts, (h * 10) as f64 + (i % 12) as f64);
            }
        }
    }
    store.add_branch("servers.retired");
    store
}

fn main() -> Result<()> {
    setup_logging();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = FinderConfig::load_or_default(config_path.as_deref());
    let now = Utc::now().timestamp();

    let store = seed_store(&config, now);
    let finder = Finder::new(Arc::new(store), config);

    for pattern in ["servers.*", "servers.web*.cpu", "servers.{web01,db01}.load"] {
        for node in finder.find_nodes(pattern) {
            match node? {
                Node::Branch(branch) => info!(pattern, path = %branch.path, "Branch"),
                Node::Leaf(leaf) => {
                    let series = leaf.fetch(now - 2 * 86_400, now)?;
                    info!(
                        pattern,
                        path = %leaf.path,
                        step = series.step,
                        slots = series.len(),
                        filled = series.filled(),
                        "Leaf"
                    );
                }
            }
        }
    }

    // Recent points not yet flushed to the store.
    let cache = Arc::new(MemPointCache::new());
    for i in 0..5 {
        cache.insert("servers.web01.cpu", now - 240 + i * 60, 99.0)?;
    }
    let leaf = finder
        .find_nodes("servers.web01.cpu")
        .filter_map(|node| match node {
            Ok(Node::Leaf(leaf)) => Some(leaf),
            _ => None,
        })
        .next();
    match leaf {
        Some(leaf) => {
            let multi = MultiReader::new(vec![
                Arc::clone(leaf.reader()),
                Arc::new(CacheReader::new(leaf.path.clone(), 60, cache)),
            ]);
            let series = multi.fetch(now - 600, now)?.wait()?;
            for (ts, value) in series.points() {
                info!(ts, ?value, "servers.web01.cpu");
            }
            info!(intervals = ?multi.intervals(), "Combined coverage");
        }
        None => warn!("servers.web01.cpu not found"),
    }

    Ok(())
}
