use futures::{stream, StreamExt};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use uti_sli::compose::{Composer, ShippingRules};
use uti_sli::config::{DEFAULT_FILE_TARGET, DEFAULT_REF_COLLECTION};
use uti_sli::contract::{
    MockFilePersistence, MockOrderQuery, MockPdfConverter, Orientation, PageSize, PdfOptions,
};
use uti_sli::model::{Bulk, DocumentType, LineItem, Order};
use uti_sli::pdf::PrintPdfConverter;
use uti_sli::render::TemplateRenderer;
use uti_sli::{Exporter, SliError, SliPipeline, SliState};

fn shipped_template() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("templates/uti_sli.html")
}

fn line_item(sku: &str, price: f64, quantity: f64) -> LineItem {
    LineItem {
        sku: sku.to_string(),
        price,
        weight: 0.2,
        quantity,
        ..Default::default()
    }
}

fn orders() -> Vec<Order> {
    vec![
        Order {
            id: "o1".into(),
            bulk_id: Some("bulk-1".into()),
            line_items: vec![line_item("A", 10.0, 2.0), line_item("B", 9.6, 1.0)],
        },
        Order {
            id: "o2".into(),
            bulk_id: Some("bulk-1".into()),
            line_items: vec![line_item("A", 10.0, 3.0)],
        },
    ]
}

fn bulk() -> Bulk {
    let mut bulk = Bulk::new("bulk-1", "GB");
    bulk.content.orders = vec!["o1".into(), "o2".into()];
    bulk
}

fn order_query_returning(orders: Vec<Order>) -> MockOrderQuery {
    let mut query = MockOrderQuery::new();
    query
        .expect_get_all_orders_in_bulk()
        .times(1)
        .returning(move |_| Ok(orders.clone()));
    query
}

fn fake_converter() -> MockPdfConverter {
    let mut converter = MockPdfConverter::new();
    converter.expect_convert().returning(|_, _| {
        stream::iter(vec![Ok(b"%PDF-1.4 ".to_vec()), Ok(b"fake".to_vec())]).boxed()
    });
    converter
}

fn composer() -> Composer {
    Composer::new(ShippingRules::default(), "care@example.com")
}

#[tokio::test]
async fn test_create_sli_records_persisted_file_on_bulk() {
    let seen_html = Arc::new(Mutex::new(String::new()));
    let seen_html_clone = seen_html.clone();
    let mut converter = MockPdfConverter::new();
    converter
        .expect_convert()
        .times(1)
        .withf(|_, options: &PdfOptions| {
            options.size == PageSize::A4 && options.orientation == Orientation::Portrait
        })
        .returning(move |html, _| {
            *seen_html_clone.lock().unwrap() = html;
            stream::iter(vec![Ok(b"%PDF-1.4 fake".to_vec())]).boxed()
        });

    let mut persistence = MockFilePersistence::new();
    persistence
        .expect_persist_file()
        .times(1)
        .withf(|filename: &str, data: &Vec<u8>, ref_collection: &str, bulk_id: &str| {
            filename.starts_with("SLI_")
                && filename.ends_with(".pdf")
                && data.as_slice() == b"%PDF-1.4 fake"
                && ref_collection == DEFAULT_REF_COLLECTION
                && bulk_id == "bulk-1"
        })
        .returning(|_, _, _, _| Ok("file-42".to_string()));

    let pipeline = SliPipeline::new(
        order_query_returning(orders()),
        persistence,
        converter,
        composer(),
        TemplateRenderer::new(shipped_template()),
    );

    let mut bulk = bulk();
    let report = pipeline.create_sli(&mut bulk).await.expect("SLI should be created");

    let file = bulk.file(DocumentType::Utisli).expect("utisli entry");
    assert_eq!(file.file_id.as_deref(), Some("file-42"));
    assert_eq!(file.target.as_deref(), Some(DEFAULT_FILE_TARGET));
    assert_eq!(file.filename.as_deref(), Some(report.filename.as_str()));
    assert!(bulk.files_created);
    assert!(bulk.files_created_at.is_some());

    assert_eq!(report.file_id, "file-42");
    assert_eq!(
        report.states,
        vec![
            SliState::Pending,
            SliState::OrdersFetched,
            SliState::Composed,
            SliState::Rendered,
            SliState::Persisted,
        ]
    );

    // A: 2×10 + 3×10 = 50, B: round(9.6) = 10
    let html = seen_html.lock().unwrap().clone();
    assert!(html.contains("<div>60</div>"), "declared value missing in markup");
    assert!(html.contains("Heathrow"));
}

#[tokio::test]
async fn test_no_orders_fails_without_render_or_persist() {
    let mut converter = MockPdfConverter::new();
    converter.expect_convert().never();
    let mut persistence = MockFilePersistence::new();
    persistence.expect_persist_file().never();

    let pipeline = SliPipeline::new(
        order_query_returning(vec![]),
        persistence,
        converter,
        composer(),
        TemplateRenderer::new(shipped_template()),
    );

    let mut bulk = bulk();
    let before = bulk.clone();
    let err = pipeline.create_sli(&mut bulk).await.unwrap_err();

    assert!(matches!(err, SliError::OrderNotFound { .. }));
    assert_eq!(err.code(), "ERR_ORDER_NOT_FOUND");
    assert_eq!(bulk, before);
}

#[tokio::test]
async fn test_order_query_failure_is_forwarded() {
    let mut query = MockOrderQuery::new();
    query
        .expect_get_all_orders_in_bulk()
        .returning(|_| Err("db unavailable".into()));
    let mut persistence = MockFilePersistence::new();
    persistence.expect_persist_file().never();

    let pipeline = SliPipeline::new(
        query,
        persistence,
        fake_converter(),
        composer(),
        TemplateRenderer::new(shipped_template()),
    );

    let mut bulk = bulk();
    let err = pipeline.create_sli(&mut bulk).await.unwrap_err();
    assert!(matches!(err, SliError::UpstreamFetch(_)));
    assert!(err.to_string().contains("db unavailable"));
}

#[tokio::test]
async fn test_template_read_failure_never_persists() {
    let mut converter = MockPdfConverter::new();
    converter.expect_convert().never();
    let mut persistence = MockFilePersistence::new();
    persistence.expect_persist_file().never();

    let pipeline = SliPipeline::new(
        order_query_returning(orders()),
        persistence,
        converter,
        composer(),
        TemplateRenderer::new("/no/such/template.html"),
    );

    let mut bulk = bulk();
    let before = bulk.clone();
    let err = pipeline.create_sli(&mut bulk).await.unwrap_err();
    assert!(matches!(err, SliError::TemplateRead { .. }));
    assert_eq!(bulk, before);
}

#[tokio::test]
async fn test_conversion_stream_error_never_persists() {
    let mut converter = MockPdfConverter::new();
    converter.expect_convert().returning(|_, _| {
        stream::iter(vec![Ok(b"%PDF".to_vec()), Err("renderer died".into())]).boxed()
    });
    let mut persistence = MockFilePersistence::new();
    persistence.expect_persist_file().never();

    let pipeline = SliPipeline::new(
        order_query_returning(orders()),
        persistence,
        converter,
        composer(),
        TemplateRenderer::new(shipped_template()),
    );

    let mut bulk = bulk();
    let err = pipeline.create_sli(&mut bulk).await.unwrap_err();
    assert!(matches!(err, SliError::Render(_)));
    assert!(!bulk.files_created);
}

#[tokio::test]
async fn test_persistence_failure_leaves_bulk_unmarked() {
    let mut persistence = MockFilePersistence::new();
    persistence
        .expect_persist_file()
        .times(1)
        .returning(|_, _, _, _| Err("disk full".into()));

    let pipeline = SliPipeline::new(
        order_query_returning(orders()),
        persistence,
        fake_converter(),
        composer(),
        TemplateRenderer::new(shipped_template()),
    );

    let mut bulk = bulk();
    let before = bulk.clone();
    let err = pipeline.create_sli(&mut bulk).await.unwrap_err();

    match &err {
        SliError::Persistence { filename, source } => {
            assert!(filename.starts_with("SLI_"));
            assert_eq!(source.to_string(), "disk full");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(bulk, before);
    assert!(!bulk.files_created);
    assert!(bulk.file(DocumentType::Utisli).is_none());
}

#[tokio::test]
async fn test_create_files_sets_mawb_only_on_success() {
    let mut persistence = MockFilePersistence::new();
    persistence
        .expect_persist_file()
        .returning(|_, _, _, _| Ok("file-7".to_string()));

    let seen_html = Arc::new(Mutex::new(String::new()));
    let seen = seen_html.clone();
    let mut converter = MockPdfConverter::new();
    converter.expect_convert().returning(move |html, _| {
        *seen.lock().unwrap() = html;
        stream::iter(vec![Ok(b"%PDF".to_vec())]).boxed()
    });

    let pipeline = SliPipeline::new(
        order_query_returning(orders()),
        persistence,
        converter,
        composer(),
        TemplateRenderer::new(shipped_template()),
    );

    let mut bulk = bulk();
    pipeline
        .create_files(&mut bulk, Some("176-12345675".into()))
        .await
        .expect("create_files should succeed");
    assert_eq!(bulk.mawb.as_deref(), Some("176-12345675"));
    assert!(seen_html.lock().unwrap().contains("MAWB: 176-12345675"));

    let sent = pipeline.send_files(bulk.clone()).await.unwrap();
    assert_eq!(sent, bulk);
}

#[tokio::test]
async fn test_create_files_failure_keeps_previous_mawb() {
    let pipeline = SliPipeline::new(
        order_query_returning(vec![]),
        MockFilePersistence::new(),
        MockPdfConverter::new(),
        composer(),
        TemplateRenderer::new(shipped_template()),
    );

    let mut bulk = bulk();
    bulk.mawb = Some("old".into());
    let err = pipeline
        .create_files(&mut bulk, Some("new".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, SliError::OrderNotFound { .. }));
    assert_eq!(bulk.mawb.as_deref(), Some("old"));
}

#[tokio::test]
async fn test_real_printpdf_converter_produces_pdf() {
    let stored = Arc::new(Mutex::new(Vec::new()));
    let stored_clone = stored.clone();
    let mut persistence = MockFilePersistence::new();
    persistence
        .expect_persist_file()
        .returning(move |_, data, _, _| {
            *stored_clone.lock().unwrap() = data;
            Ok("pdf-1".to_string())
        });

    let pipeline = SliPipeline::new(
        order_query_returning(orders()),
        persistence,
        PrintPdfConverter::default(),
        composer(),
        TemplateRenderer::new(shipped_template()),
    );

    let mut bulk = bulk();
    let report = pipeline.create_sli(&mut bulk).await.unwrap();
    let bytes = stored.lock().unwrap().clone();
    assert_eq!(&bytes[0..4], b"%PDF");
    assert_eq!(report.size_bytes, bytes.len());
}

#[tokio::test]
async fn test_independent_bulks_run_concurrently() {
    let make = |file_id: &'static str| {
        let mut persistence = MockFilePersistence::new();
        persistence
            .expect_persist_file()
            .returning(move |_, _, _, _| Ok(file_id.to_string()));
        SliPipeline::new(
            order_query_returning(orders()),
            persistence,
            fake_converter(),
            composer(),
            TemplateRenderer::new(shipped_template()),
        )
    };
    let (first, second) = (make("gb-file"), make("au-file"));

    let mut gb = bulk();
    let mut au = bulk();
    au.id = "bulk-2".into();
    au.destination_country = "AU".into();

    let (r1, r2) = tokio::join!(first.create_sli(&mut gb), second.create_sli(&mut au));
    assert_eq!(r1.unwrap().file_id, "gb-file");
    assert_eq!(r2.unwrap().file_id, "au-file");
    assert_eq!(
        au.file(DocumentType::Utisli).and_then(|f| f.file_id.as_deref()),
        Some("au-file")
    );
}
