//! Exercises spec §8's concrete scenarios end to end against real nodes on
//! loopback TCP, grounded in the teacher's `server/tests/server_test.rs`
//! style (spin up real servers, drive them through the client, assert on
//! responses) rather than mocks.

use dht_network::{Network, Overlay, OverlayNode};
use dht_types::{AxisBounds, NodeId, Point, RangeQuery, Record, Response};
use dht_utils::CommandLineConfig;
use pretty_assertions::assert_eq;

fn hex(id: u16) -> NodeId {
    NodeId::from_u16(id)
}

async fn lookup(network: &Network, at: NodeId, query: RangeQuery, n: usize) -> Response {
    match network.node(at).await.expect("node must be in the network") {
        OverlayNode::Chord(node) => node.lookup(query, n).await.unwrap(),
        OverlayNode::Pastry(node) => node.lookup(query, n).await.unwrap(),
    }
}

/// Scenario 1 (spec §8): two-node join, insert a United States review,
/// then a bounded lookup through the bootstrap node returns exactly it.
#[tokio::test]
async fn scenario_two_node_join_insert_and_lookup() {
    let network = Network::new(Overlay::Chord, "127.0.0.1", 32000, CommandLineConfig::default(), 4);
    network.build(vec![hex(0x4b12), hex(0xfa35)]).await.unwrap();

    let record = Record::new(Point::new(2018.0, 94.0, 5.5), "United States", "…delicate…".to_string());
    let category_key = record.category_key;
    network.insert(record.clone()).await.unwrap();

    let query = RangeQuery {
        category_key,
        year: AxisBounds { lower: Some(2017.0), upper: Some(2018.0) },
        rating: AxisBounds { lower: Some(90.0), upper: Some(95.0) },
        price: AxisBounds { lower: Some(4.0), upper: Some(5.5) },
    };
    match lookup(&network, hex(0x4b12), query, 1).await {
        Response::Records(records) => {
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].point, record.point);
            assert_eq!(records[0].review, record.review);
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

/// Scenario 2 (spec §8): after scenario 1, a third node joins; the lookup
/// through the original bootstrap node is unchanged, and the record now
/// physically resides wherever `find_successor` says it should - the ring's
/// own definition of ownership, not a number hand-computed for this test.
#[tokio::test]
async fn scenario_key_transfer_on_join_keeps_lookup_result_unchanged() {
    let network = Network::new(Overlay::Chord, "127.0.0.1", 32100, CommandLineConfig::default(), 4);
    network.build(vec![hex(0x4b12), hex(0xfa35)]).await.unwrap();

    let record = Record::new(Point::new(2018.0, 94.0, 5.5), "United States", "delicate".to_string());
    let category_key = record.category_key;
    network.insert(record.clone()).await.unwrap();

    network.join_node(hex(0x3722)).await.unwrap();

    let query = RangeQuery { category_key, ..Default::default() };
    match lookup(&network, hex(0x4b12), query.clone(), 1).await {
        Response::Records(records) => assert_eq!(records.len(), 1),
        other => panic!("unexpected response: {other:?}"),
    }

    let OverlayNode::Chord(bootstrap) = network.node(hex(0x4b12)).await.unwrap() else {
        panic!("expected a Chord node");
    };
    let owner = bootstrap.find_successor(category_key).await.unwrap();
    match lookup(&network, owner.id, query, 1).await {
        Response::Records(records) => assert_eq!(records.len(), 1),
        other => panic!("unexpected response: {other:?}"),
    }
}

/// Scenario 3 (spec §8): with the predefined 12-id set, `find_successor`
/// for `2fec` resolves to `3722` - the first id clockwise from `2fec`.
#[tokio::test]
async fn scenario_chord_finger_routing_resolves_to_expected_successor() {
    let network = Network::new(Overlay::Chord, "127.0.0.1", 32200, CommandLineConfig::default(), 4);
    let ids = [
        0x4b12, 0xfa35, 0x19bd, 0x37de, 0x3722, 0xca12, 0xcafe, 0xfb32, 0x20bc, 0x20bd, 0x3745, 0xd3ad,
    ];
    network.build(ids.iter().map(|&id| hex(id)).collect()).await.unwrap();

    let OverlayNode::Chord(bootstrap) = network.node(hex(0x4b12)).await.unwrap() else {
        panic!("expected a Chord node");
    };
    let owner = bootstrap.find_successor(hex(0x2fec)).await.unwrap();
    assert_eq!(owner.id, hex(0x3722));
}

/// Scenario 4 (spec §8): graceful leave of a node with a backup leaves
/// every inserted key findable, and the successor's backup afterwards
/// still covers every record the leaving node's primary held, since the
/// restoration push it sent is additive on top of steady-state
/// replication.
#[tokio::test]
async fn scenario_graceful_leave_preserves_lookups_and_backup_coverage() {
    let network = Network::new(Overlay::Chord, "127.0.0.1", 32300, CommandLineConfig::default(), 4);
    let ids = [0x4b12, 0xfa35, 0x19bd, 0x37de, 0x3722, 0xca12];
    network.build(ids.iter().map(|&id| hex(id)).collect()).await.unwrap();

    let countries = ["Kenya", "Ethiopia", "Brazil", "Colombia", "United States"];
    let mut inserted = Vec::new();
    for i in 0..10 {
        let country = countries[i % countries.len()];
        let record = Record::new(Point::new(2010.0 + i as f64, 80.0 + i as f64, 3.0 + i as f64 * 0.1), country, format!("review {i}"));
        network.insert(record.clone()).await.unwrap();
        inserted.push(record);
    }

    let leaving = hex(0x3722);
    let OverlayNode::Chord(leaving_node) = network.node(leaving).await.unwrap() else {
        panic!("expected a Chord node");
    };
    let pre_leave_primary = leaving_node.data.primary().lock().await.records().to_vec();
    let successor = leaving_node.first_successor().await.unwrap();

    network.leave_node(leaving).await.unwrap();

    for record in &inserted {
        let query = RangeQuery { category_key: record.category_key, ..Default::default() };
        let owner = network
            .node(hex(0x4b12))
            .await
            .map(|node| match node {
                OverlayNode::Chord(node) => node,
                OverlayNode::Pastry(_) => unreachable!(),
            })
            .unwrap();
        let owner_handle = owner.find_successor(record.category_key).await.unwrap();
        match lookup(&network, owner_handle.id, query, 5).await {
            Response::Records(records) => assert!(records.iter().any(|r| r.review == record.review)),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    let OverlayNode::Chord(successor_node) = network.node(successor.id).await.unwrap() else {
        panic!("expected a Chord node");
    };
    let successor_backup = successor_node.data.backup().snapshot();
    for record in &pre_leave_primary {
        assert!(
            successor_backup.iter().any(|r| r.category_key == record.category_key && r.review == record.review),
            "successor's backup is missing a record the leaving node's primary held before leaving: {record:?}",
        );
    }
}

/// Scenario 6 (spec §8): with the predefined 12-id set, `find_owner` for an
/// id already present in the ring (`3745`) returns that id itself, with a
/// full four-digit common prefix.
#[tokio::test]
async fn scenario_pastry_prefix_routing_resolves_exact_match() {
    let network = Network::new(Overlay::Pastry, "127.0.0.1", 32400, CommandLineConfig::default(), 12);
    let ids = [
        0x4b12, 0xfa35, 0x19bd, 0x37de, 0x3722, 0xca12, 0xcafe, 0xfb32, 0x20bc, 0x20bd, 0x3745, 0xd3ad,
    ];
    network.build(ids.iter().map(|&id| hex(id)).collect()).await.unwrap();

    let OverlayNode::Pastry(bootstrap) = network.node(hex(0x4b12)).await.unwrap() else {
        panic!("expected a Pastry node");
    };
    let owner = bootstrap.find_owner(hex(0x3745)).await.unwrap();
    assert_eq!(owner.id, hex(0x3745));
    assert_eq!(owner.id.common_prefix_len(hex(0x3745)), 4);
}
