use std::sync::Arc;

use editorial_importer::board::{BoardError, RawCard};
use editorial_importer::import::{
    ContentMapper, ContentSink, DRY_RUN_ENTITY_ID, ImportEngine, ImportError, ImportMappings,
    ImportOptions, NewContent, StageDetail,
};
use editorial_importer::models::ContentStage;
use editorial_importer::test_support::memory::{
    MemoryBoard, MemorySink, StaticLookups, card, with_labels, with_members,
};
use uuid::Uuid;

const IDEA_LIST: &str = "68dc7e7ab3259474182f307d";
const BRIEF_LIST: &str = "66f358dc6c4988996773f6d8";
const DRAFT_LIST: &str = "66f358e065cc3ec20689f1be";
const PUBLISHED_LIST: &str = "66f3594f320b66bf10668426";
const UNMAPPED_LIST: &str = "ffffffffffffffffffffffff";

const KIM: &str = "3b1f9a52-8c4e-4f0b-9d59-1a2b3c4d5e6f";

fn board_cards() -> Vec<RawCard> {
    let mut closed = card("c-closed", BRIEF_LIST, "Archived brief", "");
    closed.closed = true;

    vec![
        card(
            "c-idea",
            IDEA_LIST,
            "Do hearing aids cause tinnitus?",
            "Thread: https://forum.hearingtracker.com/t/tinnitus/123",
        ),
        closed,
        card("c-unmapped-1", UNMAPPED_LIST, "Someday 1", ""),
        with_labels(
            card(
                "c-brief-1",
                BRIEF_LIST,
                "Best hearing aids for tinnitus",
                "**Brief:**\nCover the top five devices.\n\n**Primary Keyword:** tinnitus hearing aids (1.2k)",
            ),
            &["Best List", "Urgent"],
        ),
        card("c-unmapped-2", UNMAPPED_LIST, "Someday 2", ""),
        card("c-brief-2", BRIEF_LIST, "Phonak vs Oticon", ""),
        card("c-unmapped-3", UNMAPPED_LIST, "Someday 3", ""),
        with_members(
            with_labels(
                card(
                    "c-draft",
                    DRAFT_LIST,
                    "Battery drain guide",
                    "**Slug:** battery-drain\n**SEO Title:** Why hearing aid batteries drain fast",
                ),
                &["Resource"],
            ),
            &["kimw"],
        ),
        card("c-unmapped-4", UNMAPPED_LIST, "Someday 4", ""),
        card("c-published", PUBLISHED_LIST, "Cleaning hearing aids", ""),
    ]
}

fn kim() -> Uuid {
    Uuid::parse_str(KIM).expect("uuid")
}

fn mappings() -> Arc<ImportMappings> {
    let mut mappings = ImportMappings::default();
    mappings
        .roster
        .insert("kimw".to_string(), "Kim@Example.com".to_string());
    Arc::new(mappings)
}

fn engine_with(board: MemoryBoard, lookups: StaticLookups, sink: Arc<MemorySink>) -> ImportEngine {
    ImportEngine::new(Arc::new(board), Arc::new(lookups), sink).with_mappings(mappings())
}

fn engine(sink: Arc<MemorySink>) -> ImportEngine {
    engine_with(
        MemoryBoard::with_cards(board_cards()),
        StaticLookups::seeded(&[("kim@example.com", kim())]),
        sink,
    )
}

/// Cards imported by an earlier run, stored before the batch starts.
async fn seed_previous_imports(sink: &MemorySink, cards: &[RawCard]) {
    let mapper = ContentMapper::new(mappings());
    for previous in cards {
        let mapped = mapper.map_card(previous).expect("mapped");
        sink.insert_content(&NewContent {
            mapped: &mapped,
            content_type_id: None,
            workflow_status_id: None,
        })
        .await
        .expect("seeded");
    }
}

#[tokio::test]
async fn batch_counts_candidates_skips_and_imports() {
    let previous = vec![
        card("c-old-brief", BRIEF_LIST, "Old brief", ""),
        card("c-old-article", PUBLISHED_LIST, "Old article", ""),
    ];

    // 1 closed, 2 unmapped, 2 already imported, 5 new.
    let mut cards = board_cards();
    cards.retain(|c| c.id != "c-unmapped-3" && c.id != "c-unmapped-4");
    cards.extend(previous.iter().cloned());
    assert_eq!(cards.len(), 10);

    let sink = Arc::new(MemorySink::new());
    seed_previous_imports(&sink, &previous).await;

    let result = engine_with(
        MemoryBoard::with_cards(cards),
        StaticLookups::seeded(&[("kim@example.com", kim())]),
        sink.clone(),
    )
    .run(&ImportOptions::new("board"))
    .await
    .expect("import runs");

    assert!(result.success);
    assert_eq!(result.total_cards, 9);
    assert_eq!(result.skipped, 4);
    assert_eq!(result.imported, 5);
    assert_eq!(result.errors, 0);
    assert_eq!(result.results.len(), 9);
    assert!(result.results.iter().all(|r| r.card_id != "c-closed"));

    let reason = |id: &str| {
        result
            .results
            .iter()
            .find(|r| r.card_id == id)
            .and_then(|r| r.skip_reason.clone())
    };
    assert_eq!(reason("c-unmapped-1").as_deref(), Some("List not mapped"));
    assert_eq!(reason("c-unmapped-2").as_deref(), Some("List not mapped"));
    assert_eq!(reason("c-old-brief").as_deref(), Some("Already imported as brief #1"));
    assert_eq!(
        reason("c-old-article").as_deref(),
        Some("Already imported as content #2")
    );

    let old_article = result
        .results
        .iter()
        .find(|r| r.card_id == "c-old-article")
        .expect("old article result");
    assert_eq!(old_article.entity_id, Some(2));
    assert_eq!(old_article.stage, Some(ContentStage::Content));

    let unmapped = result
        .results
        .iter()
        .find(|r| r.card_id == "c-unmapped-1")
        .expect("unmapped result");
    assert!(unmapped.stage.is_none());
    assert!(unmapped.entity_id.is_none());

    let new_stages: Vec<_> = sink
        .rows()
        .iter()
        .skip(previous.len())
        .map(|row| row.mapped.stage())
        .collect();
    assert_eq!(
        new_stages,
        vec![
            ContentStage::Idea,
            ContentStage::Brief,
            ContentStage::Brief,
            ContentStage::Content,
            ContentStage::Content,
        ]
    );
}

#[tokio::test]
async fn resolves_lookups_and_writes_author_assignments() {
    let sink = Arc::new(MemorySink::new());
    engine(sink.clone())
        .run(&ImportOptions::new("board"))
        .await
        .expect("import runs");

    let rows = sink.rows();
    let brief = rows
        .iter()
        .find(|row| row.mapped.source_card_id() == Some("c-brief-1"))
        .expect("brief row");
    assert_eq!(brief.content_type_id, Some(1));
    assert_eq!(brief.workflow_status_id, None);

    let draft = rows
        .iter()
        .find(|row| row.mapped.source_card_id() == Some("c-draft"))
        .expect("draft row");
    assert_eq!(draft.content_type_id, Some(2));
    assert_eq!(draft.workflow_status_id, Some(1));
    match &draft.mapped.detail {
        StageDetail::Content(content) => assert_eq!(content.slug.as_deref(), Some("battery-drain")),
        other => panic!("expected content detail, got {other:?}"),
    }

    let assignments = sink.assignments();
    assert_eq!(assignments.len(), 1);
    assert_eq!(assignments[0].0, draft.id);
    assert_eq!(assignments[0].1.user_id, kim());
    assert_eq!(assignments[0].1.role, "author");

    // Every content-stage card links back to its board card.
    let links = sink.links();
    assert_eq!(links.len(), 2);
    assert!(links.iter().all(|(_, link)| link.link_type == "trello"));
}

#[tokio::test]
async fn second_run_skips_everything_already_imported() {
    let sink = Arc::new(MemorySink::new());
    let engine = engine(sink.clone());
    let options = ImportOptions::new("board");

    engine.run(&options).await.expect("first run");
    let second = engine.run(&options).await.expect("second run");

    assert_eq!(second.total_cards, 9);
    assert_eq!(second.imported, 0);
    assert_eq!(second.skipped, 9);
    assert_eq!(second.errors, 0);
    assert_eq!(sink.rows().len(), 5);

    let idea = second
        .results
        .iter()
        .find(|r| r.card_id == "c-idea")
        .expect("idea result");
    assert_eq!(idea.skip_reason.as_deref(), Some("Already imported as idea #1"));
    assert_eq!(idea.stage, Some(ContentStage::Idea));
}

#[tokio::test]
async fn force_reimports_cards_that_already_exist() {
    let sink = Arc::new(MemorySink::new());
    let engine = engine(sink.clone());

    engine.run(&ImportOptions::new("board")).await.expect("first run");

    let mut options = ImportOptions::new("board");
    options.skip_existing = false;
    let forced = engine.run(&options).await.expect("forced run");

    assert_eq!(forced.imported, 5);
    assert_eq!(sink.rows().len(), 10);
}

#[tokio::test]
async fn dry_run_reports_without_writing() {
    let sink = Arc::new(MemorySink::new());
    let engine = engine(sink.clone());
    let mut options = ImportOptions::new("board");
    options.dry_run = true;

    let preview = engine.run(&options).await.expect("dry run");

    assert_eq!(preview.imported, 5);
    assert_eq!(preview.skipped, 4);
    assert_eq!(sink.write_count(), 0);
    assert!(preview
        .results
        .iter()
        .filter(|r| !r.skipped)
        .all(|r| r.entity_id == Some(DRY_RUN_ENTITY_ID)));

    // Nothing was recorded, so a live run still imports the same cards.
    options.dry_run = false;
    let live = engine.run(&options).await.expect("live run");

    assert_eq!(live.imported, preview.imported);
    assert_eq!(live.skipped, preview.skipped);
    assert_eq!(sink.rows().len(), 5);
    assert!(live
        .results
        .iter()
        .filter(|r| !r.skipped)
        .all(|r| r.entity_id.is_some_and(|id| id > 0)));
}

#[tokio::test]
async fn failed_insert_is_isolated_to_its_card() {
    let sink = Arc::new(MemorySink::new());
    sink.fail_insert_for("c-brief-1");

    let result = engine(sink.clone())
        .run(&ImportOptions::new("board"))
        .await
        .expect("import runs");

    assert!(!result.success);
    assert_eq!(result.errors, 1);
    assert_eq!(result.imported, 4);
    assert_eq!(result.skipped, 4);
    assert_eq!(sink.rows().len(), 4);

    let failed = result
        .results
        .iter()
        .find(|r| r.card_id == "c-brief-1")
        .expect("failed result");
    assert!(!failed.success);
    assert_eq!(failed.stage, Some(ContentStage::Brief));
    assert!(failed.error.as_deref().unwrap_or_default().contains("insert rejected"));
}

#[tokio::test]
async fn secondary_write_failures_keep_the_card_imported() {
    let sink = Arc::new(MemorySink::new());
    sink.fail_secondary_writes();

    let result = engine(sink.clone())
        .run(&ImportOptions::new("board"))
        .await
        .expect("import runs");

    assert_eq!(result.imported, 5);
    assert_eq!(result.errors, 0);
    assert_eq!(sink.rows().len(), 5);
    assert!(sink.links().is_empty());
    assert!(sink.assignments().is_empty());
}

#[tokio::test]
async fn list_filter_limits_candidates() {
    let sink = Arc::new(MemorySink::new());
    let mut options = ImportOptions::new("board");
    options.list_filter = Some(vec![BRIEF_LIST.to_string()]);

    let result = engine(sink.clone()).run(&options).await.expect("import runs");

    // The closed brief is still excluded.
    assert_eq!(result.total_cards, 2);
    assert_eq!(result.imported, 2);
    assert!(sink.rows().iter().all(|row| row.mapped.stage() == ContentStage::Brief));
}

#[tokio::test]
async fn unknown_board_member_gets_no_assignment() {
    let sink = Arc::new(MemorySink::new());
    let result = engine_with(
        MemoryBoard::with_cards(board_cards()),
        StaticLookups::seeded(&[]),
        sink.clone(),
    )
    .run(&ImportOptions::new("board"))
    .await
    .expect("import runs");

    assert_eq!(result.imported, 5);
    assert!(sink.assignments().is_empty());
}

#[tokio::test]
async fn board_fetch_failure_aborts_before_any_write() {
    let sink = Arc::new(MemorySink::new());
    let err = engine_with(
        MemoryBoard::failing(401),
        StaticLookups::seeded(&[]),
        sink.clone(),
    )
    .run(&ImportOptions::new("board"))
    .await
    .expect_err("fetch failure is fatal");

    assert!(matches!(
        err,
        ImportError::Board(BoardError::Network { status, .. }) if status.as_u16() == 401
    ));
    assert_eq!(sink.write_count(), 0);
}

#[tokio::test]
async fn lookup_failure_aborts_before_any_write() {
    let sink = Arc::new(MemorySink::new());
    let err = engine_with(
        MemoryBoard::with_cards(board_cards()),
        StaticLookups::failing(),
        sink.clone(),
    )
    .run(&ImportOptions::new("board"))
    .await
    .expect_err("lookup failure is fatal");

    assert!(matches!(err, ImportError::Lookup(_)));
    assert_eq!(sink.write_count(), 0);
}
