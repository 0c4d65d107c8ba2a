//! End-to-end pipeline tests: feed file → runner → in-memory store.

use std::io::Write;

use feedsync_core::FeedKind;
use feedsync_engine::bootstrap::ensure_reference_data;
use feedsync_engine::{ImportRunner, RunOptions};
use feedsync_feed::FeedClient;
use feedsync_store::{EntityKind, EntityStore, MemoryStore};

fn client() -> FeedClient {
    FeedClient::new(5, 5, "feedsync-test/0.1").unwrap()
}

fn feed_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{content}").unwrap();
    file
}

fn item(id: &str, code: &str, name: &str) -> String {
    format!(
        "<SHOPITEM id='{id}'>\
         <CODE>{code}</CODE>\
         <NAME>{name}</NAME>\
         <PRICE_VAT>12,00</PRICE_VAT>\
         <PURCHASE_PRICE>6,00</PURCHASE_PRICE>\
         <VAT>20</VAT>\
         <UNIT>ks</UNIT>\
         <STOCK><AMOUNT>5</AMOUNT></STOCK>\
         <CATEGORIES><CATEGORY id='1'>Teas</CATEGORY></CATEGORIES>\
         </SHOPITEM>"
    )
}

fn order(id: &str, status: &str, lines: &str) -> String {
    format!(
        "<ORDER>\
         <ORDER_ID>{id}</ORDER_ID>\
         <DATE>2024-03-15 10:30:00</DATE>\
         <STATUS>{status}</STATUS>\
         <CURRENCY><CODE>EUR</CODE></CURRENCY>\
         <CUSTOMER>\
           <EMAIL>jana@example.sk</EMAIL>\
           <BILLING_ADDRESS><NAME>Jana Kovacova</NAME><STREET>Hlavna</STREET>\
             <CITY>Bratislava</CITY><COUNTRY>SK</COUNTRY></BILLING_ADDRESS>\
         </CUSTOMER>\
         <TOTAL_PRICE><WITH_VAT>36,00</WITH_VAT><WITHOUT_VAT>30,00</WITHOUT_VAT></TOTAL_PRICE>\
         <ORDER_ITEMS>{lines}</ORDER_ITEMS>\
         </ORDER>"
    )
}

fn product_line(code: &str) -> String {
    format!(
        "<ITEM><TYPE>product</TYPE><NAME>Green Tea</NAME><AMOUNT>2</AMOUNT><CODE>{code}</CODE>\
         <UNIT_PRICE><WITH_VAT>18,00</WITH_VAT><WITHOUT_VAT>15,00</WITHOUT_VAT></UNIT_PRICE>\
         </ITEM>"
    )
}

const SHIPPING_LINE: &str = "<ITEM><TYPE>shipping</TYPE><NAME>Courier</NAME><AMOUNT>1</AMOUNT>\
     <UNIT_PRICE><WITH_VAT>4,00</WITH_VAT><WITHOUT_VAT>3,33</WITHOUT_VAT></UNIT_PRICE></ITEM>";

const BILLING_LINE: &str = "<ITEM><TYPE>billing</TYPE><NAME>Card fee</NAME><AMOUNT>1</AMOUNT></ITEM>";

#[tokio::test]
async fn item_feed_is_idempotent_across_runs() {
    let feed = feed_file(&format!(
        "<SHOP>{}{}{}</SHOP>",
        item("1", "TEA-001", "Green Tea"),
        item("2", "TEA-002", "Black Tea"),
        item("3", "TEA-003", "White Tea"),
    ));
    let client = client();
    let runner = ImportRunner::new(&client, RunOptions::default());
    let mut store = MemoryStore::new();
    ensure_reference_data(&mut store);

    let first = runner
        .run(&mut store, feed.path().to_str().unwrap(), FeedKind::Items)
        .await;
    assert!(first.success);
    assert_eq!(first.created, 3);
    assert_eq!(first.updated, 0);

    let second = runner
        .run(&mut store, feed.path().to_str().unwrap(), FeedKind::Items)
        .await;
    assert!(second.success);
    assert_eq!(second.created, 0);
    // The second run updates exactly what the first run touched.
    assert_eq!(second.updated, first.created + first.updated);
    assert_eq!(store.list(EntityKind::Item).unwrap().len(), 3);
    // Reference entities stay singular too.
    assert_eq!(
        store
            .list(EntityKind::ItemGroup)
            .unwrap()
            .iter()
            .filter(|g| g.key == "Teas")
            .count(),
        1
    );
}

#[tokio::test]
async fn record_errors_are_isolated() {
    // Record #3 has neither a code nor an external id, so its idempotency
    // key is empty after the fallback.
    let feed = feed_file(&format!(
        "<SHOP>{}{}{}{}{}</SHOP>",
        item("1", "TEA-001", "One"),
        item("2", "TEA-002", "Two"),
        "<SHOPITEM><NAME>Broken</NAME></SHOPITEM>",
        item("4", "TEA-004", "Four"),
        item("5", "TEA-005", "Five"),
    ));
    let client = client();
    let runner = ImportRunner::new(&client, RunOptions::default());
    let mut store = MemoryStore::new();

    let summary = runner
        .run(&mut store, feed.path().to_str().unwrap(), FeedKind::Items)
        .await;

    assert_eq!(summary.total, 5);
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.created + summary.updated, 4);
    assert_eq!(summary.error_messages.len(), 1);
    // Records 4 and 5 were processed despite the failure in record 3.
    assert!(store.exists(EntityKind::Item, "TEA-004").unwrap());
    assert!(store.exists(EntityKind::Item, "TEA-005").unwrap());
}

#[tokio::test]
async fn order_feed_skips_cancelled_and_insufficient_records() {
    let feed = feed_file(&format!(
        "<ORDERS>{}{}{}</ORDERS>",
        order("A-1", "Nová", &format!("{}{SHIPPING_LINE}", product_line("TEA-001"))),
        order("A-2", "Storno", &product_line("TEA-002")),
        order("A-3", "Nová", &format!("{SHIPPING_LINE}{BILLING_LINE}")),
    ));
    let client = client();
    let runner = ImportRunner::new(&client, RunOptions::default());
    let mut store = MemoryStore::new();

    let summary = runner
        .run(&mut store, feed.path().to_str().unwrap(), FeedKind::Orders)
        .await;

    assert!(summary.success);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.created, 1);
    assert_eq!(summary.skipped, 2);

    // Only the live order landed; the cancelled one created no customer
    // or order, and the shipping/billing-only record created nothing.
    let orders = store.list(EntityKind::SalesOrder).unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].text("external_order_id"), "A-1");
    assert!(!store.exists(EntityKind::Item, "TEA-002").unwrap());
}

#[tokio::test]
async fn reimported_orders_are_immutable() {
    let content = format!(
        "<ORDERS>{}</ORDERS>",
        order("B-7", "Nová", &product_line("TEA-001"))
    );
    let feed = feed_file(&content);
    let client = client();
    let runner = ImportRunner::new(&client, RunOptions::default());
    let mut store = MemoryStore::new();

    let first = runner
        .run(&mut store, feed.path().to_str().unwrap(), FeedKind::Orders)
        .await;
    assert_eq!(first.created, 1);
    let before = store.get(EntityKind::SalesOrder, "SO-B-7").unwrap();

    let second = runner
        .run(&mut store, feed.path().to_str().unwrap(), FeedKind::Orders)
        .await;
    assert_eq!(second.created, 0);
    assert_eq!(second.updated, 0);
    assert_eq!(second.skipped, 1);

    let after = store.get(EntityKind::SalesOrder, "SO-B-7").unwrap();
    assert_eq!(before, after);
    assert_eq!(store.list(EntityKind::SalesOrder).unwrap().len(), 1);
}

#[tokio::test]
async fn order_lines_reference_placeholder_items() {
    let feed = feed_file(&format!(
        "<ORDERS>{}</ORDERS>",
        order("C-1", "Nová", &product_line("UNKNOWN-9"))
    ));
    let client = client();
    let runner = ImportRunner::new(&client, RunOptions::default());
    let mut store = MemoryStore::new();

    runner
        .run(&mut store, feed.path().to_str().unwrap(), FeedKind::Orders)
        .await;

    let placeholder = store.get(EntityKind::Item, "UNKNOWN-9").unwrap();
    assert!(placeholder
        .text("description")
        .starts_with("Auto-created from order import"));
    let so = store.get(EntityKind::SalesOrder, "SO-C-1").unwrap();
    assert_eq!(so.child_rows("items").len(), 1);
}
