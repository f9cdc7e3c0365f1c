use std::path::Path;
use std::sync::Arc;
use anyhow::Context;
use clap::ValueEnum;
use owo_colors::OwoColorize;
use atlas_kb::config::{self, AtlasKbConfig};
use atlas_kb::index::Match;
use atlas_kb::ui::{
    self, banner, info, records_table, relation_map, section, stats_table, success, warn, Icons, Spinner,
};
use atlas_kb::watcher::Watcher;
use atlas_kb::{Record, RecordIndex, RelationMap, Resolver, ResolverOptions, SharedDataset};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn is_human(&self) -> bool {
        matches!(self, OutputFormat::Text)
    }
}

/// Which side of a record's relationships to show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Outbound and inbound merged
    Related,
    /// Records this one references
    Outbound,
    /// Records referencing this one
    Inbound,
}

impl Direction {
    fn title(&self) -> String {
        match self {
            Direction::Related => format!("{} Related records", Icons::LINK),
            Direction::Outbound => format!("{} Referenced by this record", Icons::RIGHT),
            Direction::Inbound => format!("{} Referencing this record", Icons::DOWN),
        }
    }

    fn resolve<'a>(&self, resolver: &Resolver<'a>, id: &str) -> atlas_kb::Result<RelationMap<'a>> {
        match self {
            Direction::Related => resolver.related_to_id(id),
            Direction::Outbound => resolver.referenced_by_id(id),
            Direction::Inbound => resolver.referencing_id(id),
        }
    }
}

/// A loaded dataset plus the options every command resolves with
pub struct Session {
    pub dataset: Arc<SharedDataset>,
    pub options: ResolverOptions,
    pub format: OutputFormat,
}

impl Session {
    pub fn open(path: &Path, options: ResolverOptions, format: OutputFormat) -> anyhow::Result<Self> {
        let spinner = Spinner::new(&format!("{} Loading {}", Icons::FILE, path.display()));
        let dataset = SharedDataset::open(path)
            .with_context(|| format!("loading dataset {}", path.display()));
        spinner.finish_and_clear();

        Ok(Self {
            dataset: Arc::new(dataset?),
            options,
            format,
        })
    }
}

pub fn run_list(session: &Session, group: Option<&str>, kind: Option<&str>) -> anyhow::Result<()> {
    let index = session.dataset.snapshot();
    let records: Vec<&Record> = match (group, kind) {
        (Some(group), _) => index.records_by_type(group).with_context(|| {
            let known: Vec<&str> = index.type_groups().collect();
            format!("known type groups: {}", known.join(", "))
        })?,
        (None, Some(kind)) => index.records_of_kind(kind),
        (None, None) => index.all_records().iter().collect(),
    };

    if !session.format.is_human() {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("∅ No records.");
    } else {
        println!("{}", records_table(records));
    }
    Ok(())
}

pub fn run_find(
    session: &Session,
    group: &str,
    attribute: &str,
    predicate: Match<'_>,
) -> anyhow::Result<()> {
    let index = session.dataset.snapshot();
    let records = index.records_matching(group, attribute, predicate)?;

    if !session.format.is_human() {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    println!("{} {} where {} {:?}...", Icons::SEARCH, group, attribute, predicate);
    if records.is_empty() {
        warn("No records found.");
    } else {
        println!("{}", records_table(records));
    }
    Ok(())
}

pub fn run_relations(session: &Session, id: &str, direction: Direction) -> anyhow::Result<()> {
    let index = session.dataset.snapshot();
    print_relations(&index, &session.options, session.format, id, direction)
}

fn print_relations(
    index: &RecordIndex,
    options: &ResolverOptions,
    format: OutputFormat,
    id: &str,
    direction: Direction,
) -> anyhow::Result<()> {
    let resolver = Resolver::with_options(index, options.clone());
    let relations = direction.resolve(&resolver, id)?;

    if !format.is_human() {
        let data = serde_json::json!({
            "id": id,
            "relations": relations,
        });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if let Some(record) = index.record_by_id(id) {
        ui::header(&record.short_description());
        if let Some(description) = record.description() {
            println!("{}", ui::muted(description.lines().next().unwrap_or("")));
        }
    }
    section(&direction.title());
    relation_map(&relations);
    Ok(())
}

pub fn run_stats(session: &Session) -> anyhow::Result<()> {
    let index = session.dataset.snapshot();
    let stats = index.stats();

    if !session.format.is_human() {
        let groups: serde_json::Map<String, serde_json::Value> = stats
            .groups
            .iter()
            .map(|(name, count)| (name.clone(), serde_json::json!(count)))
            .collect();
        let data = serde_json::json!({
            "dataset": index.info(),
            "records": stats.total_records,
            "groups": groups,
            "subtechniques": stats.subtechniques,
            "dangling_references": stats.dangling_references,
        });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    println!("{} {}", Icons::STATS, index.info().to_string().bold());
    if let Some(source) = session.dataset.source() {
        info("Source", &source.display().to_string());
    }
    let total = stats.total_records.to_string();
    let subtechniques = stats.subtechniques.to_string();
    let dangling = stats.dangling_references.to_string();
    let group_counts: Vec<(String, String)> = stats
        .groups
        .iter()
        .map(|(name, count)| (name.clone(), count.to_string()))
        .collect();

    let mut rows: Vec<(&str, &str)> = vec![("Records", total.as_str())];
    rows.extend(group_counts.iter().map(|(n, c)| (n.as_str(), c.as_str())));
    rows.push(("Sub-techniques", subtechniques.as_str()));
    rows.push(("Dangling derived references", dangling.as_str()));
    println!("{}", stats_table(&rows));
    Ok(())
}

pub fn run_init(path: &Path, dataset: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let config = AtlasKbConfig {
        dataset: Some(
            dataset
                .map(Path::to_path_buf)
                .unwrap_or_else(config::default_dataset_path)
                .display()
                .to_string(),
        ),
        ..Default::default()
    };
    config::write_config(path, &config, force)?;
    success(&format!("Wrote {}", path.display()));
    Ok(())
}

pub fn run_watch(session: &Session, id: Option<&str>) -> anyhow::Result<()> {
    if session.format.is_human() {
        banner(
            &format!("{} Watching dataset", Icons::EYE),
            &session
                .dataset
                .source()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        );
    }

    let show = |dataset: &SharedDataset| {
        let index = dataset.snapshot();
        match id {
            Some(id) => {
                if let Err(e) = print_relations(&index, &session.options, session.format, id, Direction::Related) {
                    ui::error(&e.to_string());
                }
            }
            None => success(&format!("{} ({} records)", index.info(), index.len())),
        }
    };

    show(session.dataset.as_ref());
    Watcher::new(Arc::clone(&session.dataset)).run(show)?;
    Ok(())
}
