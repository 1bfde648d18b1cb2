use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Local};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};

use crate::assets::{AssetResolver, AssetSource};
use crate::document::{self, DocStatus};
use crate::error::{EntityError, PipelineError};
use crate::fetch::Fetcher;
use crate::listing;
use crate::model::{HeroEntity, ListingEntry};
use crate::parser::{self, guides, wiki, Fallback};
use crate::settings::Settings;
use crate::store;

/// Sub-stages of a run; each can be enabled on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stages {
    /// Listing refresh, per-entity extraction and the aggregate.
    pub heroes: bool,
    /// Overview/Skills document merge.
    pub docs: bool,
    /// Wiki prose enrichment.
    pub wiki: bool,
    /// Strategy, faction meta and passive trait pages from the hero guide.
    pub guides: bool,
}

impl Stages {
    pub fn all() -> Self {
        Stages {
            heroes: true,
            docs: true,
            wiki: true,
            guides: true,
        }
    }

    /// No flag at all means every stage.
    pub fn from_flags(heroes: bool, docs: bool, wiki: bool, guides: bool, all: bool) -> Self {
        if all || !(heroes || docs || wiki || guides) {
            Self::all()
        } else {
            Stages {
                heroes,
                docs,
                wiki,
                guides,
            }
        }
    }

    fn needs_heroes(&self) -> bool {
        self.heroes || self.docs || self.wiki
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntityOutcome {
    Succeeded,
    Defaulted(Vec<Fallback>),
    Skipped(String),
}

#[derive(Debug, Clone)]
pub struct EntityReport {
    pub slug: String,
    pub outcome: EntityOutcome,
    pub hero: Option<HeroEntity>,
    pub doc: Option<DocStatus>,
}

impl EntityReport {
    fn skipped(slug: &str, err: EntityError) -> Self {
        warn!(slug = %slug, error = %err, "entity skipped");
        EntityReport {
            slug: slug.to_string(),
            outcome: EntityOutcome::Skipped(err.to_string()),
            hero: None,
            doc: None,
        }
    }
}

enum WikiOutcome {
    Merged(DocStatus),
    Skipped(String),
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub started_at: DateTime<Local>,
    pub listed: usize,
    pub succeeded: usize,
    pub defaulted: usize,
    /// `(slug, cause)` per skipped entity.
    pub skipped: Vec<(String, String)>,
    pub docs_written: usize,
    pub docs_unchanged: usize,
    pub wiki_merged: usize,
    pub wiki_unchanged: usize,
    pub wiki_skipped: Vec<(String, String)>,
    pub guides_written: usize,
    pub guides_unchanged: usize,
    /// `(page, cause)` per guide page not written.
    pub guides_skipped: Vec<(String, String)>,
    pub aggregate: Option<(PathBuf, usize)>,
}

impl RunSummary {
    fn new() -> Self {
        RunSummary {
            started_at: Local::now(),
            listed: 0,
            succeeded: 0,
            defaulted: 0,
            skipped: Vec::new(),
            docs_written: 0,
            docs_unchanged: 0,
            wiki_merged: 0,
            wiki_unchanged: 0,
            wiki_skipped: Vec::new(),
            guides_written: 0,
            guides_unchanged: 0,
            guides_skipped: Vec::new(),
            aggregate: None,
        }
    }

    fn count_doc(&mut self, status: DocStatus) {
        match status {
            DocStatus::Written => self.docs_written += 1,
            DocStatus::Unchanged => self.docs_unchanged += 1,
        }
    }

    pub fn print(&self) {
        println!("Run started {}", self.started_at.format("%Y-%m-%d %H:%M:%S"));
        if self.listed > 0 {
            println!(
                "Heroes: {} listed, {} succeeded, {} defaulted, {} skipped.",
                self.listed,
                self.succeeded,
                self.defaulted,
                self.skipped.len()
            );
            for (slug, cause) in &self.skipped {
                println!("  skipped {}: {}", slug, cause);
            }
        }
        if self.docs_written + self.docs_unchanged > 0 {
            println!(
                "Documents: {} written, {} unchanged.",
                self.docs_written, self.docs_unchanged
            );
        }
        if self.wiki_merged + self.wiki_unchanged + self.wiki_skipped.len() > 0 {
            println!(
                "Wiki: {} merged, {} unchanged, {} skipped.",
                self.wiki_merged,
                self.wiki_unchanged,
                self.wiki_skipped.len()
            );
            for (id, cause) in &self.wiki_skipped {
                println!("  wiki {}: {}", id, cause);
            }
        }
        if self.guides_written + self.guides_unchanged + self.guides_skipped.len() > 0 {
            println!(
                "Guides: {} written, {} unchanged, {} skipped.",
                self.guides_written,
                self.guides_unchanged,
                self.guides_skipped.len()
            );
            for (page, cause) in &self.guides_skipped {
                println!("  guide {}: {}", page, cause);
            }
        }
        if let Some((path, count)) = &self.aggregate {
            println!("Aggregate: {} heroes -> {}", count, path.display());
        }
    }
}

/// Drives one run. Owns the settings and the transport for its duration.
pub struct Pipeline<F> {
    settings: Arc<Settings>,
    fetcher: Arc<F>,
    assets: Arc<AssetResolver<F>>,
}

impl<F> Clone for Pipeline<F> {
    fn clone(&self) -> Self {
        Pipeline {
            settings: Arc::clone(&self.settings),
            fetcher: Arc::clone(&self.fetcher),
            assets: Arc::clone(&self.assets),
        }
    }
}

impl<F: Fetcher> Pipeline<F> {
    pub fn new(settings: Settings, fetcher: F) -> Self {
        let fetcher = Arc::new(fetcher);
        let assets = Arc::new(AssetResolver::new(Arc::clone(&fetcher), &settings));
        Pipeline {
            settings: Arc::new(settings),
            fetcher,
            assets,
        }
    }

    pub async fn run(&self, stages: Stages) -> Result<RunSummary, PipelineError> {
        let mut summary = RunSummary::new();

        if stages.needs_heroes() {
            let heroes = if stages.heroes {
                let entries = listing::fetch_entries(self.fetcher.as_ref(), &self.settings).await?;
                summary.listed = entries.len();
                let heroes = self.refresh_heroes(entries, stages.docs, &mut summary).await;

                let path = &self.settings.aggregate_path;
                store::write_aggregate(path, &heroes)?;
                info!("Wrote {} heroes to {}", heroes.len(), path.display());
                summary.aggregate = Some((path.clone(), heroes.len()));
                heroes
            } else {
                let heroes = store::read_aggregate(&self.settings.aggregate_path)?;
                info!("Loaded {} heroes from aggregate", heroes.len());
                if stages.docs {
                    self.write_documents(&heroes, &mut summary);
                }
                heroes
            };

            if stages.wiki {
                self.enrich_from_wiki(heroes, &mut summary).await;
            }
        }

        if stages.guides {
            self.update_guides(&mut summary).await;
        }

        Ok(summary)
    }

    /// Process every listed entity; returns the aggregate in listing order,
    /// first occurrence of each id kept.
    async fn refresh_heroes(
        &self,
        entries: Vec<ListingEntry>,
        write_docs: bool,
        summary: &mut RunSummary,
    ) -> Vec<HeroEntity> {
        let slugs: Vec<String> = entries.iter().map(|e| e.slug.clone()).collect();
        let this = self.clone();
        let reports = fan_out(entries, self.settings.concurrency, move |_, entry| {
            let this = this.clone();
            async move { this.process_entity(entry, write_docs).await }
        })
        .await;

        let mut seen = HashSet::new();
        let mut heroes = Vec::new();
        for (slug, report) in slugs.iter().zip(reports) {
            let report =
                report.unwrap_or_else(|| EntityReport::skipped(slug, EntityError::TaskPanicked));
            match report.outcome {
                EntityOutcome::Succeeded => summary.succeeded += 1,
                EntityOutcome::Defaulted(_) => summary.defaulted += 1,
                EntityOutcome::Skipped(cause) => summary.skipped.push((report.slug, cause)),
            }
            if let Some(status) = report.doc {
                summary.count_doc(status);
            }
            if let Some(hero) = report.hero {
                if seen.insert(hero.id.clone()) {
                    heroes.push(hero);
                }
            }
        }
        heroes
    }

    async fn process_entity(&self, entry: ListingEntry, write_docs: bool) -> EntityReport {
        let html = match self.fetcher.fetch_text(&entry.url).await {
            Ok(html) => html,
            Err(e) => return EntityReport::skipped(&entry.slug, EntityError::DetailFetch(e)),
        };

        let detail = parser::process_detail_page(&html, &entry, &self.assets.placeholder());
        let mut hero = detail.hero;
        let mut fallbacks = detail.fallbacks;

        let asset = self.assets.resolve(&hero.game_id, &entry.slug).await;
        if asset.source == AssetSource::Placeholder {
            debug!(slug = %entry.slug, tried = asset.candidates_tried.len(), "no portrait found");
            fallbacks.push(Fallback::AssetUnavailable);
        } else {
            debug!(slug = %entry.slug, path = ?asset.local_path, source = ?asset.source, "portrait resolved");
        }
        hero.image_path = asset.reference;

        let doc = if write_docs {
            match document::write_hero_document(&self.settings.docs_dir, &hero) {
                Ok(status) => Some(status),
                Err(e) => return EntityReport::skipped(&entry.slug, e),
            }
        } else {
            None
        };

        let outcome = if fallbacks.is_empty() {
            EntityOutcome::Succeeded
        } else {
            info!(slug = %entry.slug, ?fallbacks, "entity defaulted");
            EntityOutcome::Defaulted(fallbacks)
        };
        EntityReport {
            slug: entry.slug,
            outcome,
            hero: Some(hero),
            doc,
        }
    }

    fn write_documents(&self, heroes: &[HeroEntity], summary: &mut RunSummary) {
        for hero in heroes {
            match document::write_hero_document(&self.settings.docs_dir, hero) {
                Ok(status) => summary.count_doc(status),
                Err(e) => {
                    warn!(slug = %hero.id, error = %e, "document skipped");
                    summary.skipped.push((hero.id.clone(), e.to_string()));
                }
            }
        }
    }

    async fn enrich_from_wiki(&self, heroes: Vec<HeroEntity>, summary: &mut RunSummary) {
        let ids: Vec<String> = heroes.iter().map(|h| h.id.clone()).collect();
        let this = self.clone();
        let outcomes = fan_out(heroes, self.settings.concurrency, move |_, hero| {
            let this = this.clone();
            async move { this.enrich_one(&hero).await }
        })
        .await;

        for (id, outcome) in ids.into_iter().zip(outcomes) {
            match outcome {
                Some(WikiOutcome::Merged(DocStatus::Written)) => summary.wiki_merged += 1,
                Some(WikiOutcome::Merged(DocStatus::Unchanged)) => summary.wiki_unchanged += 1,
                Some(WikiOutcome::Skipped(cause)) => summary.wiki_skipped.push((id, cause)),
                None => {
                    warn!(slug = %id, "wiki task panicked");
                    summary.wiki_skipped.push((id, EntityError::TaskPanicked.to_string()));
                }
            }
        }
    }

    async fn enrich_one(&self, hero: &HeroEntity) -> WikiOutcome {
        let docs_dir = &self.settings.docs_dir;
        if !document::document_path(docs_dir, &hero.id).exists() {
            return WikiOutcome::Skipped("no document".into());
        }

        let url = wiki::page_url(&self.settings.wiki_base_url, &hero.name);
        let html = match self.fetcher.fetch_text(&url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(slug = %hero.id, error = %e, "wiki page unavailable");
                return WikiOutcome::Skipped(e.to_string());
            }
        };

        let sections = wiki::extract_sections(&html);
        if sections.is_empty() {
            return WikiOutcome::Skipped("no recognised sections".into());
        }
        match document::enrich_document(docs_dir, &hero.id, &sections) {
            Ok(Some(status)) => WikiOutcome::Merged(status),
            Ok(None) => WikiOutcome::Skipped("no document".into()),
            Err(e) => {
                warn!(slug = %hero.id, error = %e, "wiki merge failed");
                WikiOutcome::Skipped(e.to_string())
            }
        }
    }

    /// Fetch the hero guide and rewrite each page found on it. A failed fetch
    /// or a missing page header is recorded, never fatal.
    async fn update_guides(&self, summary: &mut RunSummary) {
        let url = self.settings.guides_url();
        let html = match self.fetcher.fetch_text(&url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(error = %e, "hero guide unavailable");
                summary.guides_skipped.push((url, e.to_string()));
                return;
            }
        };

        for (guide, page) in guides::extract_guides(&html) {
            let rel = guide.relative_path();
            let Some(page) = page else {
                warn!(page = rel, "{} header not found", guide.title());
                summary.guides_skipped.push((rel.to_string(), "header not found".into()));
                continue;
            };
            let path = self.settings.guides_dir.join(rel);
            match document::write_page(&path, &page) {
                Ok(DocStatus::Written) => {
                    info!("Updated {}", path.display());
                    summary.guides_written += 1;
                }
                Ok(DocStatus::Unchanged) => summary.guides_unchanged += 1,
                Err(e) => {
                    warn!(path = ?path, error = %e, "cannot write guide page");
                    summary.guides_skipped.push((rel.to_string(), e.to_string()));
                }
            }
        }
    }
}

/// Run `work` over `items` with at most `concurrency` in flight. Results come
/// back in input order regardless of completion order; `None` marks a task
/// that died before reporting.
async fn fan_out<T, R, W, Fut>(items: Vec<T>, concurrency: usize, work: W) -> Vec<Option<R>>
where
    T: Send + 'static,
    R: Send + 'static,
    W: Fn(usize, T) -> Fut,
    Fut: Future<Output = R> + Send + 'static,
{
    let total = items.len();
    let concurrency = concurrency.max(1);
    let semaphore = Arc::new(Semaphore::new(concurrency));

    let pb = ProgressBar::new(total as u64);
    if let Ok(style) =
        ProgressStyle::default_bar().template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
    {
        pb.set_style(style.progress_chars("=> "));
    }

    let (tx, mut rx) = mpsc::channel::<(usize, R)>(concurrency * 2);

    for (index, item) in items.into_iter().enumerate() {
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();
        let task = work(index, item);

        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire().await else { return };
            let result = task.await;
            let _ = tx.send((index, result)).await;
        });
    }

    // Receiver closes once every task has dropped its sender.
    drop(tx);

    let mut results: Vec<Option<R>> = std::iter::repeat_with(|| None).take(total).collect();
    while let Some((index, result)) = rx.recv().await {
        if let Some(slot) = results.get_mut(index) {
            *slot = Some(result);
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    let missing = results.iter().filter(|r| r.is_none()).count();
    if missing > 0 {
        warn!("{} of {} tasks did not report", missing, total);
    }
    results
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::*;
    use crate::error::FetchError;
    use crate::fetch::mock::MockFetcher;
    use crate::model::{Faction, Rarity, SkillType};

    const BASE: &str = "https://th.test";
    const WIKI: &str = "https://wiki.test/wiki/";

    fn settings(root: &Path) -> Settings {
        Settings {
            base_url: BASE.into(),
            entity_segment: "entity".into(),
            wiki_base_url: WIKI.into(),
            docs_dir: root.join("docs"),
            images_dir: root.join("img"),
            aggregate_path: root.join("data/heroes.json"),
            guides_dir: root.join("rag"),
            delay_ms: 0,
            concurrency: 2,
            ..Settings::default()
        }
    }

    fn listing(links: &[(&str, &str)]) -> String {
        let cards: String = links
            .iter()
            .map(|(href, text)| format!(r#"<div class="card"><a href="{}">{}</a></div>"#, href, text))
            .collect();
        format!("<html><body>{}</body></html>", cards)
    }

    fn fixture(name: &str) -> String {
        fs::read_to_string(format!("tests/fixtures/{}", name)).unwrap()
    }

    /// Delegates to a `MockFetcher` but panics on one URL.
    struct PanicOn {
        inner: MockFetcher,
        url: &'static str,
    }

    impl Fetcher for PanicOn {
        async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
            if url == self.url {
                panic!("fetcher blew up on {}", url);
            }
            self.inner.fetch_text(url).await
        }

        async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            self.inner.fetch_bytes(url).await
        }
    }

    fn heroes_only() -> Stages {
        Stages {
            heroes: true,
            docs: false,
            wiki: false,
            guides: false,
        }
    }

    fn warlock_fetcher() -> MockFetcher {
        MockFetcher::default()
            .with_page(
                "https://th.test/hero.php",
                &listing(&[("/entity/warlock", "Warlock — Horde")]),
            )
            .with_page("https://th.test/entity/warlock", &fixture("warlock.html"))
    }

    #[test]
    fn stage_flags() {
        assert_eq!(Stages::from_flags(false, false, false, false, false), Stages::all());
        assert_eq!(Stages::from_flags(true, true, true, true, false), Stages::all());
        let docs_only = Stages::from_flags(false, true, false, false, false);
        assert!(!docs_only.heroes && docs_only.docs && !docs_only.wiki && !docs_only.guides);
        assert_eq!(Stages::from_flags(false, true, false, false, true), Stages::all());
        let guides_only = Stages::from_flags(false, false, false, true, false);
        assert!(guides_only.guides && !guides_only.needs_heroes());
    }

    #[tokio::test]
    async fn fan_out_keeps_input_order() {
        let out = fan_out((0..20u64).collect(), 4, |i, n| async move {
            tokio::time::sleep(std::time::Duration::from_millis(20 - n)).await;
            (i, n * 2)
        })
        .await;
        let expected: Vec<_> = (0..20u64).map(|n| Some((n as usize, n * 2))).collect();
        assert_eq!(out, expected);
    }

    #[tokio::test]
    async fn fan_out_marks_panicked_task() {
        let out = fan_out(vec![1u32, 2, 3], 2, |_, n| async move {
            if n == 2 {
                panic!("worker {} failed", n);
            }
            n * 10
        })
        .await;
        assert_eq!(out, vec![Some(10), None, Some(30)]);
    }

    #[tokio::test]
    async fn panicked_entity_is_reported_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path());
        let inner = MockFetcher::default()
            .with_page(
                "https://th.test/hero.php",
                &listing(&[("/entity/ghost", "Ghost"), ("/entity/warlock", "Warlock — Horde")]),
            )
            .with_page("https://th.test/entity/warlock", &fixture("warlock.html"));
        let fetcher = PanicOn {
            inner,
            url: "https://th.test/entity/ghost",
        };

        let summary = Pipeline::new(s.clone(), fetcher).run(heroes_only()).await.unwrap();
        assert_eq!(summary.skipped, vec![("ghost".to_string(), "task panicked".to_string())]);
        let heroes = store::read_aggregate(&s.aggregate_path).unwrap();
        assert_eq!(heroes.len(), 1);
        assert_eq!(heroes[0].id, "warlock");
    }

    #[tokio::test]
    async fn unwritable_docs_dir_skips_entity() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path());
        fs::write(&s.docs_dir, "not a directory").unwrap();

        let summary = Pipeline::new(s.clone(), warlock_fetcher())
            .run(Stages {
                docs: true,
                ..heroes_only()
            })
            .await
            .unwrap();
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].0, "warlock");
        assert!(summary.skipped[0].1.starts_with("cannot write document"));
        assert_eq!(summary.docs_written, 0);
        assert!(store::read_aggregate(&s.aggregate_path).unwrap().is_empty());
    }

    #[tokio::test]
    async fn unwritable_aggregate_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings(dir.path());
        fs::write(dir.path().join("blocker"), "file").unwrap();
        s.aggregate_path = dir.path().join("blocker/heroes.json");

        let err = Pipeline::new(s, warlock_fetcher()).run(heroes_only()).await.unwrap_err();
        assert!(matches!(err, PipelineError::AggregateWrite { .. }));
    }

    #[tokio::test]
    async fn guides_stage_writes_three_pages() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path());
        let fetcher = MockFetcher::default()
            .with_page("https://th.test/hero-guide.php", &fixture("hero_guide.html"));
        let pipeline = Pipeline::new(s.clone(), fetcher);
        let guides_only = Stages::from_flags(false, false, false, true, false);

        let summary = pipeline.run(guides_only).await.unwrap();
        assert_eq!(summary.guides_written, 3);
        assert!(summary.guides_skipped.is_empty());
        assert_eq!(pipeline.fetcher.requests(), vec!["https://th.test/hero-guide.php"]);
        assert!(!s.aggregate_path.exists());

        let core = fs::read_to_string(s.guides_dir.join("mechanics/core-strategy.md")).unwrap();
        assert!(core.starts_with("# Core Hero Strategy\n\n## Focus Your Resources\n"));
        let meta = fs::read_to_string(s.guides_dir.join("meta/faction-meta.md")).unwrap();
        assert!(meta.starts_with("# Faction Meta Guides\n"));
        let passives = fs::read_to_string(s.guides_dir.join("mechanics/epic-passives.md")).unwrap();
        assert!(passives.contains("| Knight | Valor | +5% ATK |"));

        let again = pipeline.run(guides_only).await.unwrap();
        assert_eq!(again.guides_written, 0);
        assert_eq!(again.guides_unchanged, 3);
    }

    #[tokio::test]
    async fn guides_failure_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path());
        let fetcher = MockFetcher::default().with_page(
            "https://th.test/hero-guide.php",
            "<html><body><h2>Faction Meta Guides</h2><p>Pick one faction.</p></body></html>",
        );
        let summary = Pipeline::new(s.clone(), fetcher)
            .run(Stages::from_flags(false, false, false, true, false))
            .await
            .unwrap();
        assert_eq!(summary.guides_written, 1);
        let skipped: Vec<_> = summary.guides_skipped.iter().map(|(page, _)| page.as_str()).collect();
        assert_eq!(skipped, vec!["mechanics/core-strategy.md", "mechanics/epic-passives.md"]);
        assert!(s.guides_dir.join("meta/faction-meta.md").exists());

        let summary = Pipeline::new(s, MockFetcher::default())
            .run(Stages::from_flags(false, false, false, true, false))
            .await
            .unwrap();
        assert_eq!(summary.guides_skipped.len(), 1);
        assert!(summary.guides_skipped[0].1.contains("404"));
    }

    #[tokio::test]
    async fn warlock_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path());
        let pipeline = Pipeline::new(s.clone(), warlock_fetcher());
        let stages = Stages { heroes: true, docs: true, wiki: false, guides: false };

        let summary = pipeline.run(stages).await.unwrap();
        assert_eq!(summary.listed, 1);
        assert_eq!(summary.defaulted, 1);
        assert!(summary.skipped.is_empty());
        assert_eq!(summary.docs_written, 1);

        let doc = fs::read_to_string(s.docs_dir.join("warlock.md")).unwrap();
        let sections = document::sections::parse_sections(&doc);
        let skills = document::sections::find_section(&sections, "Skills").unwrap();
        let body = &doc[skills.body_span.clone()];
        assert_eq!(body.matches("### ").count(), 1);
        assert!(body.contains("### Curse"));

        let heroes = store::read_aggregate(&s.aggregate_path).unwrap();
        assert_eq!(heroes.len(), 1);
        let hero = &heroes[0];
        assert_eq!(hero.id, "warlock");
        assert_eq!(hero.faction, Faction::Horde);
        assert_eq!(hero.rarity, Rarity::Legendary);
        assert_eq!(hero.image_path, "/img/heroes/placeholder.png");
        assert_eq!(hero.skills.len(), 1);
        assert_eq!(hero.skills[0].name, "Curse");
        assert_eq!(hero.skills[0].kind, SkillType::Active);
        assert_eq!(hero.skills[0].description, "Reduces enemy defense");
    }

    #[tokio::test]
    async fn second_run_leaves_document_identical() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path());
        let stages = Stages { heroes: true, docs: true, wiki: false, guides: false };

        Pipeline::new(s.clone(), warlock_fetcher()).run(stages).await.unwrap();
        let first = fs::read_to_string(s.docs_dir.join("warlock.md")).unwrap();

        let summary = Pipeline::new(s.clone(), warlock_fetcher()).run(stages).await.unwrap();
        assert_eq!(summary.docs_unchanged, 1);
        assert_eq!(fs::read_to_string(s.docs_dir.join("warlock.md")).unwrap(), first);
    }

    #[tokio::test]
    async fn listing_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(settings(dir.path()), MockFetcher::default());
        let err = pipeline.run(Stages::all()).await.unwrap_err();
        assert!(matches!(err, PipelineError::ListingFetch(_)));
        assert!(!dir.path().join("data/heroes.json").exists());
    }

    #[tokio::test]
    async fn detail_failure_skips_only_that_entity() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path());
        let fetcher = MockFetcher::default()
            .with_page(
                "https://th.test/hero.php",
                &listing(&[("/entity/ghost", "Ghost"), ("/entity/warlock", "Warlock — Horde")]),
            )
            .with_page("https://th.test/entity/warlock", &fixture("warlock.html"));
        let pipeline = Pipeline::new(s.clone(), fetcher);

        let summary = pipeline
            .run(Stages { heroes: true, docs: true, wiki: false, guides: false })
            .await
            .unwrap();
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].0, "ghost");
        assert!(!s.docs_dir.join("ghost.md").exists());

        let heroes = store::read_aggregate(&s.aggregate_path).unwrap();
        let ids: Vec<_> = heroes.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["warlock"]);
    }

    #[tokio::test]
    async fn aggregate_follows_listing_order() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path());
        let master = fixture("hero_master.html");
        let fetcher = MockFetcher::default()
            .with_page(
                "https://th.test/hero.php",
                &listing(&[("/entity/tide-caller", "Tidecaller"), ("/entity/pixie", "Pixie")]),
            )
            .with_page("https://th.test/entity/tide-caller", &master)
            .with_page("https://th.test/entity/pixie", &master);
        let pipeline = Pipeline::new(s.clone(), fetcher);

        pipeline
            .run(heroes_only())
            .await
            .unwrap();
        let heroes = store::read_aggregate(&s.aggregate_path).unwrap();
        let ids: Vec<_> = heroes.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["tide-caller", "pixie"]);
        assert_eq!(heroes[0].faction, Faction::Nature);
        assert!(!s.docs_dir.exists());
    }

    #[tokio::test]
    async fn wiki_stage_from_existing_aggregate() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path());
        Pipeline::new(s.clone(), warlock_fetcher())
            .run(Stages { heroes: true, docs: true, wiki: false, guides: false })
            .await
            .unwrap();

        let fetcher = MockFetcher::default()
            .with_page("https://wiki.test/wiki/Warlock", &fixture("wiki_warlock.html"));
        let pipeline = Pipeline::new(s.clone(), fetcher);
        let summary = pipeline
            .run(Stages { heroes: false, docs: false, wiki: true, guides: false })
            .await
            .unwrap();
        assert_eq!(summary.wiki_merged, 1);

        let doc = fs::read_to_string(s.docs_dir.join("warlock.md")).unwrap();
        let order: Vec<_> = document::sections::parse_sections(&doc)
            .into_iter()
            .filter(|s| s.level == 2)
            .map(|s| s.heading)
            .collect();
        assert_eq!(order, vec!["Overview", "Lore", "Skills", "Strategy"]);
        assert!(doc.contains("He now serves the Horde."));
    }

    #[tokio::test]
    async fn wiki_skips_heroes_without_documents() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(dir.path());
        Pipeline::new(s.clone(), warlock_fetcher())
            .run(heroes_only())
            .await
            .unwrap();

        let fetcher = MockFetcher::default();
        let pipeline = Pipeline::new(s.clone(), fetcher);
        let summary = pipeline
            .run(Stages { heroes: false, docs: false, wiki: true, guides: false })
            .await
            .unwrap();
        assert_eq!(summary.wiki_skipped, vec![("warlock".to_string(), "no document".to_string())]);
        assert!(pipeline.fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn docs_only_without_aggregate_fails() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(settings(dir.path()), MockFetcher::default());
        let err = pipeline
            .run(Stages { heroes: false, docs: true, wiki: false, guides: false })
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::AggregateRead { .. }));
    }
}
