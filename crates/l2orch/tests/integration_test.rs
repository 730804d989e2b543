//! End-to-end tests: CONFIG_DB/APPL_DB writes in, ASIC_DB rows out.
//!
//! Every test drives a full [`OrchStack`] and waits on `settled()` between
//! steps; nothing sleeps.

use pretty_assertions::assert_eq;
use sonic_l2orch::{L2OrchConfig, OrchStack};
use sonic_orch_common::schema::{appl_db, asic_db, config_db};
use sonic_orch_common::{DiagnosticKind, EventOrigin, Operation};
use sonic_sai::SaiApi;
use sonic_types::{MacAddress, VlanId};
use std::sync::atomic::Ordering;

const MAC: &str = "52-54-00-25-06-E9";
const FDB_KEY: &str = "Vlan2:52-54-00-25-06-E9";

fn stack() -> OrchStack {
    OrchStack::build(&L2OrchConfig::default()).unwrap()
}

fn stack_with(edit: impl FnOnce(&mut L2OrchConfig)) -> OrchStack {
    let mut config = L2OrchConfig::default();
    edit(&mut config);
    OrchStack::build(&config).unwrap()
}

fn create_vlan(stack: &OrchStack, id: u16) {
    stack.config_db.table(config_db::VLAN).set(
        &format!("Vlan{}", id),
        vec![("vlanid".to_string(), id.to_string())],
    );
}

fn remove_vlan(stack: &OrchStack, id: u16) {
    stack.config_db.table(config_db::VLAN).del(&format!("Vlan{}", id));
}

fn create_member(stack: &OrchStack, id: u16, iface: &str, mode: &str) {
    stack.config_db.table(config_db::VLAN_MEMBER).set(
        &format!("Vlan{}|{}", id, iface),
        vec![("tagging_mode".to_string(), mode.to_string())],
    );
}

fn remove_member(stack: &OrchStack, id: u16, iface: &str) {
    stack
        .config_db
        .table(config_db::VLAN_MEMBER)
        .del(&format!("Vlan{}|{}", id, iface));
}

fn set_fdb(stack: &OrchStack, key: &str, fields: &[(&str, &str)]) {
    stack.appl_db.table(appl_db::FDB_TABLE).set(
        key,
        fields
            .iter()
            .map(|(f, v)| (f.to_string(), v.to_string()))
            .collect(),
    );
}

fn count(stack: &OrchStack, table: &str) -> usize {
    stack.asic_db.table(table).len()
}

fn vlan2() -> VlanId {
    VlanId::new(2).unwrap()
}

fn mac() -> MacAddress {
    MAC.parse().unwrap()
}

/// The only FDB_ENTRY record in ASIC_DB.
fn single_fdb_record(stack: &OrchStack) -> Vec<(String, String)> {
    let rows = stack.asic_db.table(asic_db::FDB_ENTRY).scan();
    assert_eq!(rows.len(), 1, "expected exactly one FDB entry: {:?}", rows);
    rows.into_iter().next().map(|(_, fvs)| fvs).unwrap()
}

fn field<'a>(fvs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    fvs.iter()
        .find(|(f, _)| f == name)
        .map(|(_, v)| v.as_str())
}

fn bridge_port_of(stack: &OrchStack, iface: &str) -> String {
    stack.maps.bridge_port(iface).unwrap().to_oid_string()
}

// ============================================================================
// Causal ordering
// ============================================================================

#[tokio::test]
async fn test_fdb_added_before_vlan_and_member() {
    let stack = stack();

    set_fdb(&stack, FDB_KEY, &[("port", "Ethernet0"), ("type", "dynamic")]);
    stack.settled().await;
    assert_eq!(count(&stack, asic_db::FDB_ENTRY), 0);

    create_vlan(&stack, 2);
    stack.settled().await;
    assert_eq!(count(&stack, asic_db::VLAN), 2);
    assert_eq!(count(&stack, asic_db::FDB_ENTRY), 0);

    create_member(&stack, 2, "Ethernet0", "untagged");
    stack.settled().await;
    assert_eq!(count(&stack, asic_db::BRIDGE_PORT), 1);
    assert_eq!(count(&stack, asic_db::VLAN_MEMBER), 1);

    let fdb = single_fdb_record(&stack);
    assert_eq!(field(&fdb, "SAI_FDB_ENTRY_ATTR_TYPE"), Some("SAI_FDB_ENTRY_TYPE_DYNAMIC"));
    assert_eq!(
        field(&fdb, "SAI_FDB_ENTRY_ATTR_BRIDGE_PORT_ID"),
        Some(bridge_port_of(&stack, "Ethernet0").as_str())
    );
    assert_eq!(
        field(&fdb, "SAI_FDB_ENTRY_ATTR_PACKET_ACTION"),
        Some("SAI_PACKET_ACTION_FORWARD")
    );
    assert!(stack.diagnostics.is_empty());
    stack.shutdown().await;
}

#[tokio::test]
async fn test_member_before_vlan_converges() {
    let stack = stack();

    create_member(&stack, 2, "Ethernet0", "untagged");
    stack.settled().await;
    assert_eq!(count(&stack, asic_db::VLAN_MEMBER), 0);
    assert_eq!(count(&stack, asic_db::BRIDGE_PORT), 0);

    create_vlan(&stack, 2);
    stack.settled().await;
    assert_eq!(count(&stack, asic_db::VLAN_MEMBER), 1);
    assert_eq!(count(&stack, asic_db::BRIDGE_PORT), 1);
    stack.shutdown().await;
}

#[tokio::test]
async fn test_fdb_never_observed_before_prerequisites() {
    let stack = stack();
    let mut fdb_feed = stack.asic_db.table(asic_db::FDB_ENTRY).watch();
    let mut member_feed = stack.asic_db.table(asic_db::VLAN_MEMBER).watch();

    set_fdb(&stack, FDB_KEY, &[("port", "Ethernet0")]);
    create_member(&stack, 2, "Ethernet0", "untagged");
    create_vlan(&stack, 2);
    stack.settled().await;

    // The member was written before the FDB entry that depends on it.
    assert!(member_feed.try_recv().is_some());
    assert!(fdb_feed.try_recv().is_some());
    assert!(fdb_feed.try_recv().is_none());
    stack.shutdown().await;
}

#[tokio::test]
async fn test_fdb_del_cancels_pending_entry() {
    let stack = stack();

    set_fdb(&stack, FDB_KEY, &[("port", "Ethernet0")]);
    stack.settled().await;
    stack.appl_db.table(appl_db::FDB_TABLE).del(FDB_KEY);
    stack.settled().await;

    create_vlan(&stack, 2);
    create_member(&stack, 2, "Ethernet0", "untagged");
    stack.settled().await;
    assert_eq!(count(&stack, asic_db::FDB_ENTRY), 0);
    assert_eq!(stack.fdb_stats.entries_added.load(Ordering::Relaxed), 0);
    stack.shutdown().await;
}

// ============================================================================
// Idempotence
// ============================================================================

#[tokio::test]
async fn test_reapplied_config_has_no_side_effects() {
    let stack = stack();
    create_vlan(&stack, 2);
    create_member(&stack, 2, "Ethernet0", "untagged");
    set_fdb(&stack, FDB_KEY, &[("port", "Ethernet0")]);
    stack.settled().await;

    let mut feeds: Vec<_> = [
        asic_db::VLAN,
        asic_db::BRIDGE_PORT,
        asic_db::VLAN_MEMBER,
        asic_db::FDB_ENTRY,
    ]
    .iter()
    .map(|table| {
        let mut feed = stack.asic_db.table(table).watch();
        // Skip the snapshot of existing rows.
        while feed.try_recv().is_some() {}
        feed
    })
    .collect();

    create_vlan(&stack, 2);
    create_member(&stack, 2, "Ethernet0", "untagged");
    set_fdb(&stack, FDB_KEY, &[("port", "Ethernet0")]);
    stack.settled().await;

    for feed in &mut feeds {
        assert!(feed.try_recv().is_none());
    }
    assert_eq!(count(&stack, asic_db::VLAN), 2);
    assert_eq!(count(&stack, asic_db::BRIDGE_PORT), 1);
    assert_eq!(count(&stack, asic_db::VLAN_MEMBER), 1);
    assert_eq!(count(&stack, asic_db::FDB_ENTRY), 1);
    assert_eq!(stack.ports_stats.vlans_created.load(Ordering::Relaxed), 1);
    stack.shutdown().await;
}

// ============================================================================
// Deletion ordering and cascades
// ============================================================================

#[tokio::test]
async fn test_vlan_with_member_is_not_removed() {
    let stack = stack();
    create_vlan(&stack, 2);
    create_member(&stack, 2, "Ethernet0", "untagged");
    stack.settled().await;

    remove_vlan(&stack, 2);
    stack.settled().await;
    assert_eq!(count(&stack, asic_db::VLAN), 2);
    let diag = stack.diagnostics.get(config_db::VLAN, "Vlan2").unwrap();
    assert_eq!(diag.kind, DiagnosticKind::ReferentialViolation);

    // Removing the member lets the parked VLAN delete through.
    remove_member(&stack, 2, "Ethernet0");
    stack.settled().await;
    assert_eq!(count(&stack, asic_db::VLAN), 1);
    assert_eq!(count(&stack, asic_db::VLAN_MEMBER), 0);
    assert_eq!(count(&stack, asic_db::BRIDGE_PORT), 0);
    assert!(stack.diagnostics.get(config_db::VLAN, "Vlan2").is_none());
    assert!(stack.maps.vlan_oid(vlan2()).is_none());
    stack.shutdown().await;
}

#[tokio::test]
async fn test_default_vlan_is_never_removed() {
    let stack = stack();
    create_vlan(&stack, 1);
    stack.settled().await;
    remove_vlan(&stack, 1);
    stack.settled().await;

    assert_eq!(count(&stack, asic_db::VLAN), 1);
    assert!(stack.maps.vlan_oid(VlanId::DEFAULT).is_some());
    stack.shutdown().await;
}

#[tokio::test]
async fn test_bridge_port_removal_sends_fdb_back_to_pending() {
    let stack = stack();
    create_vlan(&stack, 2);
    create_member(&stack, 2, "Ethernet0", "untagged");
    set_fdb(&stack, FDB_KEY, &[("port", "Ethernet0")]);
    stack
        .switch
        .learn_fdb_entry(vlan2(), "00:11:22:33:44:55".parse().unwrap(), "Ethernet0")
        .unwrap();
    stack.settled().await;
    assert_eq!(count(&stack, asic_db::FDB_ENTRY), 2);
    assert_eq!(stack.appl_db.table(appl_db::FDB_TABLE).len(), 2);
    let first_bridge_port = bridge_port_of(&stack, "Ethernet0");

    remove_member(&stack, 2, "Ethernet0");
    stack.settled().await;
    assert_eq!(count(&stack, asic_db::BRIDGE_PORT), 0);
    assert_eq!(count(&stack, asic_db::FDB_ENTRY), 0);
    // The learned entry is gone; the provisioned one waits in FDB_TABLE.
    assert_eq!(
        stack.appl_db.table(appl_db::FDB_TABLE).keys(),
        vec![FDB_KEY.to_string()]
    );
    assert!(stack.learned.is_empty());
    assert!(stack.diagnostics.is_empty());

    create_member(&stack, 2, "Ethernet0", "untagged");
    stack.settled().await;
    let fdb = single_fdb_record(&stack);
    let second_bridge_port = bridge_port_of(&stack, "Ethernet0");
    assert_ne!(first_bridge_port, second_bridge_port);
    assert_eq!(
        field(&fdb, "SAI_FDB_ENTRY_ATTR_BRIDGE_PORT_ID"),
        Some(second_bridge_port.as_str())
    );
    stack.shutdown().await;
}

#[tokio::test]
async fn test_member_removal_keeps_shared_bridge_port() {
    let stack = stack();
    create_vlan(&stack, 2);
    create_vlan(&stack, 3);
    create_member(&stack, 2, "Ethernet0", "untagged");
    create_member(&stack, 3, "Ethernet0", "tagged");
    set_fdb(&stack, FDB_KEY, &[("port", "Ethernet0")]);
    stack.settled().await;
    assert_eq!(count(&stack, asic_db::BRIDGE_PORT), 1);
    assert_eq!(count(&stack, asic_db::VLAN_MEMBER), 2);

    remove_member(&stack, 3, "Ethernet0");
    stack.settled().await;
    assert_eq!(count(&stack, asic_db::BRIDGE_PORT), 1);
    assert_eq!(count(&stack, asic_db::VLAN_MEMBER), 1);
    assert_eq!(count(&stack, asic_db::FDB_ENTRY), 1);
    stack.shutdown().await;
}

// ============================================================================
// Hardware-origin learning
// ============================================================================

#[tokio::test]
async fn test_learned_mac_is_mirrored_once_without_feedback() {
    let stack = stack();
    create_vlan(&stack, 2);
    create_member(&stack, 2, "Ethernet0", "untagged");
    stack.settled().await;

    let mut asic_feed = stack.asic_db.table(asic_db::FDB_ENTRY).watch();
    let mut appl_feed = stack.appl_db.table(appl_db::FDB_TABLE).watch();

    stack.switch.learn_fdb_entry(vlan2(), mac(), "Ethernet0").unwrap();
    stack.settled().await;

    let appl = stack.appl_db.table(appl_db::FDB_TABLE);
    assert_eq!(appl.keys(), vec![FDB_KEY.to_string()]);
    assert_eq!(appl.get_field(FDB_KEY, "port").as_deref(), Some("Ethernet0"));
    assert_eq!(appl.get_field(FDB_KEY, "type").as_deref(), Some("dynamic"));

    let appl_event = appl_feed.try_recv().unwrap();
    assert!(appl_event.is_hardware_origin());
    assert!(appl_feed.try_recv().is_none());

    // Only the switch's own write; FdbOrch did not program it again.
    assert!(asic_feed.try_recv().is_some());
    assert!(asic_feed.try_recv().is_none());
    assert_eq!(stack.fdb_stats.entries_added.load(Ordering::Relaxed), 0);
    assert_eq!(stack.fdb_stats.hardware_events_ignored.load(Ordering::Relaxed), 1);
    assert_eq!(stack.listener_stats.learned.load(Ordering::Relaxed), 1);
    stack.shutdown().await;
}

#[tokio::test]
async fn test_aged_mac_is_removed_from_appl_db() {
    let stack = stack();
    create_vlan(&stack, 2);
    create_member(&stack, 2, "Ethernet0", "untagged");
    stack.settled().await;
    stack.switch.learn_fdb_entry(vlan2(), mac(), "Ethernet0").unwrap();
    stack.settled().await;

    let mut appl_feed = stack.appl_db.table(appl_db::FDB_TABLE).watch();
    while appl_feed.try_recv().is_some() {}

    assert!(stack.switch.age_fdb_entry(vlan2(), mac()));
    stack.settled().await;

    assert!(stack.appl_db.table(appl_db::FDB_TABLE).is_empty());
    assert_eq!(count(&stack, asic_db::FDB_ENTRY), 0);
    let event = appl_feed.try_recv().unwrap();
    assert_eq!(event.op, Operation::Del);
    assert!(event.is_hardware_origin());
    assert!(stack.learned.is_empty());
    stack.shutdown().await;
}

#[tokio::test]
async fn test_aged_entry_written_with_colons_can_be_reprovisioned() {
    let stack = stack();
    let row = "Vlan2:52:54:00:25:06:e9";
    create_vlan(&stack, 2);
    create_member(&stack, 2, "Ethernet0", "untagged");
    set_fdb(&stack, row, &[("port", "Ethernet0")]);
    stack.settled().await;
    assert_eq!(count(&stack, asic_db::FDB_ENTRY), 1);

    assert!(stack.switch.age_fdb_entry(vlan2(), mac()));
    stack.settled().await;

    let appl = stack.appl_db.table(appl_db::FDB_TABLE);
    assert!(appl.is_empty(), "row left behind: {:?}", appl.keys());
    assert_eq!(count(&stack, asic_db::FDB_ENTRY), 0);

    set_fdb(&stack, row, &[("port", "Ethernet0")]);
    stack.settled().await;
    assert_eq!(appl.keys(), vec![row.to_string()]);
    assert_eq!(count(&stack, asic_db::FDB_ENTRY), 1);
    stack.shutdown().await;
}

#[tokio::test]
async fn test_hardware_echo_does_not_swallow_local_write() {
    let stack = stack();
    create_vlan(&stack, 2);
    create_member(&stack, 2, "Ethernet0", "untagged");
    create_member(&stack, 2, "Ethernet4", "untagged");
    stack.settled().await;

    // Both writes land before FdbOrch runs its next pass.
    let appl = stack.appl_db.table(appl_db::FDB_TABLE);
    appl.set(
        FDB_KEY,
        vec![
            ("port".to_string(), "Ethernet4".to_string()),
            ("type".to_string(), "static".to_string()),
        ],
    );
    appl.set_with_origin(
        FDB_KEY,
        vec![
            ("port".to_string(), "Ethernet0".to_string()),
            ("type".to_string(), "dynamic".to_string()),
        ],
        EventOrigin::Hardware,
    );
    stack.settled().await;

    let fdb = single_fdb_record(&stack);
    assert_eq!(field(&fdb, "SAI_FDB_ENTRY_ATTR_TYPE"), Some("SAI_FDB_ENTRY_TYPE_STATIC"));
    assert_eq!(
        field(&fdb, "SAI_FDB_ENTRY_ATTR_BRIDGE_PORT_ID"),
        Some(bridge_port_of(&stack, "Ethernet4").as_str())
    );
    stack.shutdown().await;
}

#[tokio::test]
async fn test_provisioned_entry_overrides_learned_entry() {
    let stack = stack();
    create_vlan(&stack, 2);
    create_member(&stack, 2, "Ethernet0", "untagged");
    create_member(&stack, 2, "Ethernet4", "untagged");
    stack.settled().await;
    stack.switch.learn_fdb_entry(vlan2(), mac(), "Ethernet0").unwrap();
    stack.settled().await;
    assert_eq!(stack.learned.len(), 1);

    set_fdb(&stack, FDB_KEY, &[("port", "Ethernet4"), ("type", "static")]);
    stack.settled().await;

    let fdb = single_fdb_record(&stack);
    assert_eq!(field(&fdb, "SAI_FDB_ENTRY_ATTR_TYPE"), Some("SAI_FDB_ENTRY_TYPE_STATIC"));
    assert_eq!(
        field(&fdb, "SAI_FDB_ENTRY_ATTR_BRIDGE_PORT_ID"),
        Some(bridge_port_of(&stack, "Ethernet4").as_str())
    );
    assert!(stack.learned.is_empty());

    // A static entry is pinned: the dataplane cannot move it back.
    assert_eq!(
        stack.switch.learn_fdb_entry(vlan2(), mac(), "Ethernet0").unwrap(),
        None
    );
    stack.shutdown().await;
}

#[tokio::test]
async fn test_provisioned_attribute_change_replaces_entry() {
    let stack = stack();
    create_vlan(&stack, 2);
    create_member(&stack, 2, "Ethernet0", "untagged");
    set_fdb(&stack, FDB_KEY, &[("port", "Ethernet0")]);
    stack.settled().await;

    set_fdb(&stack, FDB_KEY, &[("packet_action", "drop")]);
    stack.settled().await;

    let fdb = single_fdb_record(&stack);
    assert_eq!(
        field(&fdb, "SAI_FDB_ENTRY_ATTR_PACKET_ACTION"),
        Some("SAI_PACKET_ACTION_DROP")
    );
    assert_eq!(stack.fdb_stats.entries_updated.load(Ordering::Relaxed), 1);
    stack.shutdown().await;
}

// ============================================================================
// Bridge-port uniqueness
// ============================================================================

#[tokio::test]
async fn test_bridge_port_unique_across_add_remove_cycles() {
    let stack = stack();
    create_vlan(&stack, 2);
    create_vlan(&stack, 3);
    stack.settled().await;

    for _ in 0..3 {
        create_member(&stack, 2, "Ethernet0", "untagged");
        create_member(&stack, 3, "Ethernet0", "tagged");
        stack.settled().await;
        assert_eq!(count(&stack, asic_db::BRIDGE_PORT), 1);

        remove_member(&stack, 2, "Ethernet0");
        stack.settled().await;
        assert_eq!(count(&stack, asic_db::BRIDGE_PORT), 1);

        remove_member(&stack, 3, "Ethernet0");
        stack.settled().await;
        assert_eq!(count(&stack, asic_db::BRIDGE_PORT), 0);
    }

    // Back-to-back writes collapse in the consumer but still converge.
    create_member(&stack, 2, "Ethernet0", "untagged");
    remove_member(&stack, 2, "Ethernet0");
    create_member(&stack, 2, "Ethernet0", "untagged");
    stack.settled().await;
    assert_eq!(count(&stack, asic_db::BRIDGE_PORT), 1);
    assert_eq!(count(&stack, asic_db::VLAN_MEMBER), 1);
    assert_eq!(stack.maps.bridge_port_count(), 1);
    stack.shutdown().await;
}

// ============================================================================
// Tagging mode update
// ============================================================================

#[tokio::test]
async fn test_tagging_mode_update_in_place() {
    let stack = stack();
    create_vlan(&stack, 2);
    create_member(&stack, 2, "Ethernet0", "untagged");
    stack.settled().await;
    let members = stack.asic_db.table(asic_db::VLAN_MEMBER).keys();

    create_member(&stack, 2, "Ethernet0", "tagged");
    stack.settled().await;

    let table = stack.asic_db.table(asic_db::VLAN_MEMBER);
    assert_eq!(table.keys(), members);
    assert_eq!(
        table
            .get_field(&members[0], "SAI_VLAN_MEMBER_ATTR_VLAN_TAGGING_MODE")
            .as_deref(),
        Some("SAI_VLAN_TAGGING_MODE_TAGGED")
    );
    assert_eq!(stack.ports_stats.members_updated.load(Ordering::Relaxed), 1);
    stack.shutdown().await;
}

// ============================================================================
// Routing-side writes leave bridging alone
// ============================================================================

#[tokio::test]
async fn test_admin_status_interface_and_neighbor_writes() {
    let stack = stack();
    create_vlan(&stack, 6);
    create_member(&stack, 6, "Ethernet64", "untagged");
    create_member(&stack, 6, "Ethernet68", "untagged");
    stack.settled().await;

    for port in ["Ethernet64", "Ethernet68"] {
        stack
            .config_db
            .table(config_db::PORT)
            .hset(port, "admin_status", "up");
    }
    stack
        .config_db
        .table(config_db::VLAN_INTERFACE)
        .hset("Vlan6|192.168.6.1/24", "NULL", "NULL");
    stack.appl_db.table(appl_db::NEIGH_TABLE).set(
        "Vlan6:192.168.6.10",
        vec![
            ("neigh".to_string(), "00:00:00:00:00:02".to_string()),
            ("family".to_string(), "IPv4".to_string()),
        ],
    );
    stack.settled().await;

    for port in ["Ethernet64", "Ethernet68"] {
        let oid = stack.switch.port_id(port).unwrap().to_oid_string();
        assert_eq!(
            stack
                .asic_db
                .table(asic_db::PORT)
                .get_field(&oid, "SAI_PORT_ATTR_ADMIN_STATE")
                .as_deref(),
            Some("true")
        );
    }
    assert_eq!(count(&stack, asic_db::VLAN), 2);
    assert_eq!(count(&stack, asic_db::BRIDGE_PORT), 2);
    assert_eq!(count(&stack, asic_db::VLAN_MEMBER), 2);
    assert_eq!(count(&stack, asic_db::FDB_ENTRY), 0);
    assert_eq!(stack.appl_db.table(appl_db::NEIGH_TABLE).len(), 1);
    assert!(stack.diagnostics.is_empty());
    stack.shutdown().await;
}

// ============================================================================
// Pending policy and diagnostics
// ============================================================================

#[tokio::test]
async fn test_pending_overflow_is_reported() {
    let stack = stack_with(|config| config.fdb.max_pending = 1);

    set_fdb(&stack, "Vlan2:00-00-00-00-00-01", &[("port", "Ethernet0")]);
    set_fdb(&stack, "Vlan2:00-00-00-00-00-02", &[("port", "Ethernet0")]);
    stack.settled().await;

    let overflow = stack.diagnostics.of_kind(DiagnosticKind::PendingOverflow);
    assert_eq!(overflow.len(), 1);
    assert_eq!(overflow[0].key, "Vlan2:00-00-00-00-00-02");
    assert_eq!(stack.fdb_stats.entries_rejected.load(Ordering::Relaxed), 1);

    create_vlan(&stack, 2);
    create_member(&stack, 2, "Ethernet0", "untagged");
    stack.settled().await;
    assert_eq!(count(&stack, asic_db::FDB_ENTRY), 1);
    stack.shutdown().await;
}

#[tokio::test]
async fn test_pending_timeout_reports_but_keeps_entry() {
    let stack = stack_with(|config| config.fdb.pending_timeout_secs = 0);

    set_fdb(&stack, FDB_KEY, &[("port", "Ethernet0")]);
    stack.settled().await;
    stack.fire_timers();
    stack.settled().await;

    let diag = stack.diagnostics.get(appl_db::FDB_TABLE, FDB_KEY).unwrap();
    assert_eq!(diag.kind, DiagnosticKind::UnresolvedPrerequisite);
    assert!(diag.message.contains("VLAN:Vlan2"));

    // Reported once, not on every tick.
    stack.fire_timers();
    stack.settled().await;
    assert_eq!(
        stack
            .diagnostics
            .get(appl_db::FDB_TABLE, FDB_KEY)
            .unwrap()
            .occurrences,
        1
    );

    create_vlan(&stack, 2);
    create_member(&stack, 2, "Ethernet0", "untagged");
    stack.settled().await;
    assert_eq!(count(&stack, asic_db::FDB_ENTRY), 1);
    assert!(stack.diagnostics.get(appl_db::FDB_TABLE, FDB_KEY).is_none());
    stack.shutdown().await;
}

#[tokio::test]
async fn test_malformed_entries_are_dropped_and_reported() {
    let stack = stack();
    create_vlan(&stack, 2);
    create_member(&stack, 2, "Ethernet0", "untagged");
    set_fdb(&stack, FDB_KEY, &[("type", "dynamic")]);
    set_fdb(&stack, "Vlan2:01-00-5E-00-00-01", &[("port", "Ethernet0")]);
    create_member(&stack, 5000, "Ethernet0", "untagged");
    stack.settled().await;

    assert_eq!(count(&stack, asic_db::FDB_ENTRY), 0);
    let malformed = stack.diagnostics.of_kind(DiagnosticKind::Malformed);
    assert_eq!(malformed.len(), 3);
    assert_eq!(stack.fdb_stats.entries_parked.load(Ordering::Relaxed), 0);

    // The other keys kept flowing.
    assert_eq!(count(&stack, asic_db::VLAN_MEMBER), 1);
    stack.shutdown().await;
}

#[tokio::test]
async fn test_unknown_port_waits_and_is_reported() {
    let stack = stack();
    create_vlan(&stack, 2);
    create_member(&stack, 2, "Ethernet999", "untagged");
    stack
        .config_db
        .table(config_db::PORT)
        .hset("Ethernet999", "admin_status", "up");
    stack.settled().await;

    assert_eq!(count(&stack, asic_db::VLAN_MEMBER), 0);
    let waiting = stack.diagnostics.of_kind(DiagnosticKind::UnresolvedPrerequisite);
    assert_eq!(waiting.len(), 2);
    assert!(waiting.iter().all(|d| d.message.contains("Ethernet999")));
    stack.shutdown().await;
}
