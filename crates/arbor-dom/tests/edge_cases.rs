//! Edge case tests for arbor-dom
//!
//! Concurrency, resource deduplication through the document, stale handles
//! and boundary conditions of the mutation API.

use arbor_dom::css::{StyleRule, StyleSheet};
use arbor_dom::net::{Completion, FetchOutcome, NetError, Request, Response, Transport};
use arbor_dom::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex, mpsc};
use std::thread;
use std::time::Duration;

/// Holds completions until the test releases them
#[derive(Default)]
struct HeldTransport {
    sends: AtomicUsize,
    held: Mutex<Vec<Completion>>,
}

impl HeldTransport {
    fn held(&self) -> usize {
        self.held.lock().unwrap().len()
    }

    fn release(&self, body: &[u8]) {
        let held: Vec<_> = self.held.lock().unwrap().drain(..).collect();
        for done in held {
            done(Ok(Response::ok(body.to_vec())));
        }
    }
}

impl Transport for HeldTransport {
    fn send(&self, _request: Request, on_complete: Completion) {
        self.sends.fetch_add(1, Ordering::SeqCst);
        self.held.lock().unwrap().push(on_complete);
    }

    fn send_blocking(&self, request: Request) -> std::result::Result<Response, NetError> {
        Err(NetError::NotFound(request.url))
    }
}

struct Quiet;

impl DocumentListener for Quiet {}

/// UI adapter that stays subscribed for as long as it lives
struct SubscribedUi {
    _subscription: Subscription,
}

impl SubscribedUi {
    fn attach(doc: &Document, node: NodeId) {
        let ui = SubscribedUi {
            _subscription: doc.subscribe(Arc::new(Quiet)),
        };
        doc.set_ui_node(node, Arc::new(ui)).unwrap();
    }
}

impl UiNode for SubscribedUi {
    fn repaint(&self) {}
    fn bounds(&self) -> Bounds {
        Bounds::default()
    }
    fn focus(&self) {}
    fn blur(&self) {}
}

/// Runs `op` on a worker thread and fails if it does not finish in time
fn finishes(doc: &Document, op: impl FnOnce(&Document) + Send + 'static) -> bool {
    let doc = doc.clone();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        op(&doc);
        let _ = tx.send(());
    });
    rx.recv_timeout(Duration::from_secs(5)).is_ok()
}

fn doc_with(transport: Arc<HeldTransport>) -> Document {
    Document::builder()
        .config(DocumentConfig::default().with_url("http://example.com/page.html"))
        .transport(transport)
        .build()
}

// ============================================================================
// RESOURCE DEDUPLICATION
// ============================================================================

#[test]
fn test_concurrent_image_loads_share_one_request() {
    let transport = Arc::new(HeldTransport::default());
    let doc = doc_with(transport.clone());
    let (tx, rx) = mpsc::channel();
    let barrier = Arc::new(Barrier::new(6));

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let doc = doc.clone();
            let tx = tx.clone();
            let barrier = barrier.clone();
            // Same resource, spelled differently
            let uri = if i % 2 == 0 { "img/logo.png" } else { "/img/logo.png#top" };
            thread::spawn(move || {
                barrier.wait();
                doc.load_image(uri, move |outcome| tx.send(outcome).unwrap());
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(transport.sends.load(Ordering::SeqCst), 1);
    assert_eq!(doc.pending_fetch_count(), 1);

    let releaser = {
        let transport = transport.clone();
        thread::spawn(move || transport.release(b"png"))
    };
    releaser.join().unwrap();

    let outcomes: Vec<Arc<FetchOutcome>> = (0..6)
        .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
        .collect();
    assert!(outcomes.iter().all(|o| Arc::ptr_eq(o, &outcomes[0])));
    assert_eq!(outcomes[0].response().unwrap().body, b"png".to_vec());
    assert_eq!(doc.pending_fetch_count(), 0);

    let stats = doc.fetch_stats();
    assert_eq!(stats.total_requests, 6);
    assert_eq!(stats.unique, 1);
    assert_eq!(stats.deduplicated, 5);
}

#[test]
fn test_late_request_after_completion_refetches() {
    let transport = Arc::new(HeldTransport::default());
    let doc = doc_with(transport.clone());
    let (tx, rx) = mpsc::channel();

    let first = tx.clone();
    doc.load_image("a.png", move |o| first.send(o).unwrap());
    transport.release(b"1");
    rx.recv_timeout(Duration::from_secs(5)).unwrap();

    doc.load_image("a.png", move |o| tx.send(o).unwrap());
    assert_eq!(transport.held(), 1);
    assert_eq!(transport.sends.load(Ordering::SeqCst), 2);
    transport.release(b"2");
    let second = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(second.response().unwrap().body, b"2".to_vec());
}

#[test]
fn test_fetch_is_not_cancellable() {
    // Dropping interest does not cancel: the callback still runs once the
    // transport completes. No cancellation token exists.
    let transport = Arc::new(HeldTransport::default());
    let doc = doc_with(transport.clone());
    let calls = Arc::new(AtomicUsize::new(0));
    {
        let calls = calls.clone();
        doc.load_image("gone.png", move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
        });
    }
    drop(doc);
    transport.release(b"");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_images_disabled_skip_transport() {
    let transport = Arc::new(HeldTransport::default());
    let doc = doc_with(transport.clone());
    doc.set_images_enabled(false);
    let (tx, rx) = mpsc::channel();
    doc.load_image("a.png", move |o| tx.send(o).unwrap());
    assert!(matches!(*rx.try_recv().unwrap(), FetchOutcome::Empty));
    assert_eq!(transport.sends.load(Ordering::SeqCst), 0);
}

#[test]
fn test_failed_style_sheet_leaves_document_usable() {
    let transport = Arc::new(HeldTransport::default());
    let doc = doc_with(transport);
    let link = doc.create_element("link");
    doc.append(doc.root(), link).unwrap();
    assert!(!doc.load_style_sheet(link, "missing.css").unwrap());
    assert_eq!(doc.style_sheet_count(), 0);
    assert!(doc.computed_style(link).is_ok());

    let ghost = doc.create_element("link");
    doc.discard(ghost).unwrap();
    assert!(doc.load_style_sheet(ghost, "x.css").is_err());
}

// ============================================================================
// CONCURRENT MUTATION
// ============================================================================

#[test]
fn test_parallel_appends_keep_tree_consistent() {
    let doc = Document::new();
    let body = doc.create_element("body");
    doc.append(doc.root(), body).unwrap();
    let all = doc.get_elements_by_tag_name(body, "li").unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let doc = doc.clone();
            thread::spawn(move || {
                let list = doc.create_element("ul");
                doc.append(body, list).unwrap();
                for _ in 0..50 {
                    let li = doc.create_element("li");
                    doc.append(list, li).unwrap();
                    assert_eq!(doc.parent(li).unwrap(), Some(list));
                }
                list
            })
        })
        .collect();
    let lists: Vec<NodeId> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(doc.child_count(body).unwrap(), 4);
    for list in lists {
        let kids = doc.children(list).unwrap();
        assert_eq!(kids.len(), 50);
        assert!(kids.iter().all(|k| doc.parent(*k).unwrap() == Some(list)));
    }
    assert_eq!(all.length(), 200);
}

#[test]
fn test_moving_node_between_threads() {
    let doc = Document::new();
    let body = doc.create_element("body");
    doc.append(doc.root(), body).unwrap();
    let a = doc.create_element("div");
    let b = doc.create_element("div");
    let item = doc.create_element("span");
    doc.append(body, a).unwrap();
    doc.append(body, b).unwrap();
    doc.append(a, item).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let doc = doc.clone();
            let target = if i % 2 == 0 { a } else { b };
            thread::spawn(move || {
                for _ in 0..25 {
                    doc.append(target, item).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let in_a = doc.children(a).unwrap().contains(&item);
    let in_b = doc.children(b).unwrap().contains(&item);
    assert!(in_a ^ in_b);
    let parent = doc.parent(item).unwrap();
    assert_eq!(parent, Some(if in_a { a } else { b }));
}

#[test]
fn test_adopt_from_builder_thread() {
    let doc = Document::new();
    let body = doc.create_element("body");
    doc.append(doc.root(), body).unwrap();
    let builder = Arc::new(TreeBuilder::new());

    let staged = {
        let builder = builder.clone();
        thread::spawn(move || {
            let table = builder.create_element("table");
            for row in 0..3 {
                let tr = builder.create_element("tr");
                builder.set_attribute(tr, "id", &format!("row{row}")).unwrap();
                builder.append(table, tr).unwrap();
            }
            table
        })
        .join()
        .unwrap()
    };

    let adopted = doc.adopt(body, &builder).unwrap();
    let table = adopted.get(staged).unwrap();
    assert_eq!(doc.children(body).unwrap(), vec![table]);
    assert_eq!(doc.child_count(table).unwrap(), 3);
    assert_eq!(doc.lookup_by_id("row2").map(|r| doc.parent(r).unwrap()), Some(Some(table)));
    assert!(builder.is_empty());
}

// ============================================================================
// BOUNDARIES
// ============================================================================

#[test]
fn test_stale_handle_after_discard() {
    let doc = Document::new();
    let old = doc.create_element("div");
    doc.discard(old).unwrap();
    let reused = doc.create_element("span");
    assert_ne!(old, reused);
    assert!(matches!(doc.tag_name(old), Err(DomError::ReferenceNotFound(_))));
    assert_eq!(doc.tag_name(reused).unwrap(), "span");
}

#[test]
fn test_document_node_rules() {
    let doc = Document::new();
    let div = doc.create_element("div");
    doc.append(doc.root(), div).unwrap();
    assert!(matches!(
        doc.append(div, doc.root()),
        Err(DomError::InvalidModification(_))
    ));
    assert!(matches!(
        doc.discard(doc.root()),
        Err(DomError::InvalidModification(_))
    ));    assert!(matches!(
        doc.set_text(doc.root(), "x"),
        Err(DomError::InvalidModification(_))
    ));
}

// ============================================================================
// NODE LIFETIME
// ============================================================================

#[test]
fn test_discard_drops_subscribed_ui_after_unlocking() {
    let doc = Document::new();
    let div = doc.create_element("div");
    SubscribedUi::attach(&doc, div);
    assert_eq!(doc.listener_count(), 1);

    assert!(finishes(&doc, move |doc| doc.discard(div).unwrap()));
    assert_eq!(doc.listener_count(), 0);
}

#[test]
fn test_normalize_drops_merged_ui_after_unlocking() {
    let doc = Document::new();
    let p = doc.create_element("p");
    doc.append(doc.root(), p).unwrap();
    let a = doc.create_text("a");
    let b = doc.create_text("b");
    doc.append(p, a).unwrap();
    doc.append(p, b).unwrap();
    SubscribedUi::attach(&doc, b);

    assert!(finishes(&doc, move |doc| {
        doc.normalize(p).unwrap();
    }));
    assert_eq!(doc.listener_count(), 0);
    assert_eq!(doc.text_content(p).unwrap(), "ab");
}

#[test]
fn test_replacing_ui_node_drops_old_one_after_unlocking() {
    let doc = Document::new();
    let div = doc.create_element("div");
    SubscribedUi::attach(&doc, div);

    assert!(finishes(&doc, move |doc| SubscribedUi::attach(doc, div)));
    assert_eq!(doc.listener_count(), 1);
}

#[test]
fn test_set_text_content_reuses_text_slots() {
    let doc = Document::new();
    let p = doc.create_element("p");
    doc.append(doc.root(), p).unwrap();
    doc.set_text_content(p, "start").unwrap();
    let baseline = doc.node_count();

    for i in 0..1000 {
        doc.set_text_content(p, &format!("line {i}")).unwrap();
    }
    assert_eq!(doc.node_count(), baseline);
    assert_eq!(doc.text_content(p).unwrap(), "line 999");
}

#[test]
fn test_set_text_content_keeps_replaced_elements() {
    let doc = Document::new();
    let p = doc.create_element("p");
    let b = doc.create_element("b");
    doc.append(p, b).unwrap();
    doc.set_text_content(p, "plain").unwrap();

    assert_eq!(doc.parent(b).unwrap(), None);
    doc.discard(b).unwrap();
    assert!(doc.tag_name(b).is_err());
}

#[test]
fn test_removed_nodes_are_freed_by_discard() {
    let doc = Document::new();
    let list = doc.create_element("ul");
    doc.append(doc.root(), list).unwrap();
    let baseline = doc.node_count();

    for _ in 0..100 {
        let li = doc.create_element("li");
        doc.append(list, li).unwrap();
        let removed = doc.remove_at(list, 0).unwrap();
        doc.discard(removed).unwrap();
    }
    assert_eq!(doc.node_count(), baseline);
}

#[test]
fn test_insert_before_self_is_noop() {
    let doc = Document::new();
    let body = doc.create_element("body");
    let p = doc.create_element("p");
    doc.append(body, p).unwrap();
    doc.insert_before(body, p, Some(p)).unwrap();
    assert_eq!(doc.children(body).unwrap(), vec![p]);
}

#[test]
fn test_insert_at_end_index() {
    let doc = Document::new();
    let body = doc.create_element("body");
    let p = doc.create_element("p");
    doc.insert_at(body, p, 0).unwrap();
    assert_eq!(doc.children(body).unwrap(), vec![p]);
}

#[test]
fn test_normalize_without_adjacent_text_is_silent() {
    #[derive(Default)]
    struct Count(AtomicUsize);
    impl DocumentListener for Count {
        fn structure_invalidated(&self, _doc: &Document, _node: NodeId) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let doc = Document::new();
    let p = doc.create_element("p");
    doc.append(doc.root(), p).unwrap();
    doc.append(p, doc.create_text("a")).unwrap();
    doc.append(p, doc.create_element("br")).unwrap();
    doc.append(p, doc.create_text("b")).unwrap();

    let count = Arc::new(Count::default());
    let _sub = doc.subscribe(count.clone());
    assert!(!doc.normalize(p).unwrap());
    assert_eq!(count.0.load(Ordering::SeqCst), 0);
}

#[test]
fn test_sibling_rule_follows_class_change() {
    let doc = Document::new();
    let body = doc.create_element("body");
    doc.append(doc.root(), body).unwrap();
    doc.add_style_sheet(
        StyleSheet::new().with_rule(StyleRule::new(".a + p", vec![]).declare("color", "red")),
    );
    let first = doc.create_element("div");
    let second = doc.create_element("p");
    doc.set_attribute(first, "class", "a").unwrap();
    doc.append(body, first).unwrap();
    doc.append(body, second).unwrap();
    assert_eq!(doc.computed_style(second).unwrap().get("color"), Some("red"));

    doc.set_attribute(first, "class", "b").unwrap();
    assert_eq!(doc.computed_style(second).unwrap().get("color"), None);

    doc.set_attribute(first, "class", "a").unwrap();
    let spacer = doc.create_element("span");
    doc.insert_before(body, spacer, Some(second)).unwrap();
    assert_eq!(doc.computed_style(second).unwrap().get("color"), None);
}

#[test]
fn test_pseudo_toggle_silent_while_suspended() {
    let doc = Document::new();
    let body = doc.create_element("body");
    doc.append(doc.root(), body).unwrap();
    doc.add_style_sheet(
        StyleSheet::new().with_rule(StyleRule::new("div:hover", vec![]).declare("color", "red")),
    );
    let div = doc.create_element("div");
    doc.append(body, div).unwrap();

    #[derive(Default)]
    struct Looks(AtomicUsize);
    impl DocumentListener for Looks {
        fn look_invalidated(&self, _doc: &Document, _node: NodeId) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
    let looks = Arc::new(Looks::default());
    let _sub = doc.subscribe(looks.clone());

    doc.set_notifications_suspended(body, true).unwrap();
    assert!(doc.set_mouse_over(div, true).unwrap());
    assert_eq!(looks.0.load(Ordering::SeqCst), 0);

    doc.set_notifications_suspended(body, false).unwrap();
    assert!(doc.set_mouse_over(div, false).unwrap());
    assert_eq!(looks.0.load(Ordering::SeqCst), 1);
}

#[test]
fn test_malformed_style_attribute_is_ignored() {
    let doc = Document::new();
    let div = doc.create_element("div");
    doc.append(doc.root(), div).unwrap();
    doc.set_attribute(div, "style", "color: red; {{{").unwrap();
    let style = doc.computed_style(div).unwrap();
    assert_eq!(style.get("display"), Some("block"));
}
