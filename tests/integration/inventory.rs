use mockito::Matcher;
use serde_json::json;

use mlm_api::{Inventory, InventoryFilters, InventoryOptions};

use crate::common::{api, client_for, mock_login, mock_logout};

fn mock_for_sid(
    server: &mut mockito::Server,
    path: &str,
    sid: &str,
    body: &str,
) -> mockito::Mock {
    server
        .mock("GET", Matcher::Regex(format!("^{}", api(path))))
        .match_query(Matcher::UrlEncoded("sid".into(), sid.into()))
        .with_status(200)
        .with_body(body)
        .create()
}

#[test]
fn test_inventory_from_server() {
    let mut server = mockito::Server::new();
    let _login = mock_login(&mut server);
    let logout = mock_logout(&mut server);

    let _systems = server
        .mock("GET", api("/system/listSystems").as_str())
        .with_status(200)
        .with_body(
            json!({"success": true, "result": [
                {"id": 1000010000, "name": "web01.example.com", "last_checkin": "2024-05-01"},
                {"id": 1000010001, "name": "db01.example.com"},
                {"id": 1000010002, "name": "retired.example.com", "active": false}
            ]})
            .to_string(),
        )
        .create();
    let _reboot = server
        .mock("GET", api("/system/listSuggestedReboot").as_str())
        .with_status(200)
        .with_body(r#"{"result": [{"id": 1000010001, "name": "db01.example.com"}]}"#)
        .create();

    for sid in ["1000010000", "1000010001", "1000010002"] {
        let errata = if sid == "1000010000" {
            r#"{"result": [{"advisory_name": "SUSE-SU-2024:0001-1"}]}"#
        } else {
            r#"{"result": []}"#
        };
        mock_for_sid(&mut server, "/system/getRelevantErrata", sid, errata);
        mock_for_sid(
            &mut server,
            "/system/getRegistrationDate",
            sid,
            r#"{"result": "2023-03-14T09:00:00Z"}"#,
        );
        mock_for_sid(
            &mut server,
            "/system/listGroups",
            sid,
            r#"{"result": [
                {"id": 7, "subscribed": 1, "system_group_name": "system_group_Production"},
                {"id": 8, "subscribed": 0, "system_group_name": "Staging"}
            ]}"#,
        );
    }

    let mut client = client_for(&server);
    let options = InventoryOptions::default()
        .with_filters(InventoryFilters::default().with_system_groups(["production"]));
    let inventory = Inventory::collect(&mut client, &options).unwrap();

    let hosts: Vec<_> = inventory.hosts().collect();
    assert_eq!(hosts, vec!["db01.example.com", "web01.example.com"]);

    let doc = inventory.to_json();
    assert_eq!(doc["patch_status_needs_patches"]["hosts"], json!(["web01.example.com"]));
    assert_eq!(doc["patch_status_needs_reboot"]["hosts"], json!(["db01.example.com"]));
    assert_eq!(
        doc["Production"]["hosts"],
        json!(["db01.example.com", "web01.example.com"])
    );
    assert!(doc.get("Staging").is_none());

    let web = &doc["_meta"]["hostvars"]["web01.example.com"];
    assert_eq!(web["system_name"], json!("web01.example.com"));
    assert_eq!(web["ansible_host"], json!("web01.example.com"));
    assert_eq!(web["errata_count"], json!(1));
    assert_eq!(web["registration_date"], json!("2023-03-14T09:00:00Z"));
    assert_eq!(web["last_checkin"], json!("2024-05-01"));

    assert!(!client.is_authenticated());
    logout.assert();
}
