use std::path::Path;

use clap::Parser;

use barbot_lib::bar::BarError;
use barbot_lib::catalog::{Catalog, DispenserSlot, MemoryCatalog};
use barbot_lib::cli::Cli;

const BAR: &str = r#"{
    "dispenser_types": [
        {"id": 1, "name": "optic"},
        {"id": 2, "name": "mixer"}
    ],
    "ingredients": [
        {"id": 2, "name": "Tonic", "dispenser_type_id": 2, "dispenser_param": 3000},
        {"id": 4, "name": "Vodka", "dispenser_type_id": 1, "dispenser_param": 100, "alcoholic": true}
    ],
    "dispensers": [
        {"id": 2, "name": "Optic 2", "dispenser_type_id": 1, "rail_position": 7},
        {"id": 3, "name": "Mixer 1", "dispenser_type_id": 2, "rail_position": 9, "ingredient_id": 2}
    ],
    "recipes": [
        {"id": 2, "name": "Vodka tonic", "ingredients": [
            {"ingredient_id": 4, "seq": 1, "qty": 1},
            {"ingredient_id": 2, "seq": 2, "qty": 1}
        ]}
    ]
}"#;

async fn barbot(catalog: &Path, args: &[&str]) -> anyhow::Result<()> {
    let mut argv = vec![
        "barbot",
        "--catalog",
        catalog.to_str().unwrap(),
        "--serial",
        "/dev/barbot-test-no-such-port",
    ];
    argv.extend_from_slice(args);
    barbot_lib::run(Cli::try_parse_from(argv).unwrap()).await
}

#[tokio::test]
async fn menu_and_dispenser_listing_read_the_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bar.json");
    std::fs::write(&path, BAR).unwrap();

    barbot(&path, &["menu"]).await.unwrap();
    barbot(&path, &["dispensers"]).await.unwrap();
}

#[tokio::test]
async fn unmakeable_order_survives_until_its_ingredient_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bar.json");
    std::fs::write(&path, BAR).unwrap();

    // Vodka is not loaded: the order is recorded but nothing can be sent.
    let err = barbot(&path, &["make", "--recipe", "2"]).await.unwrap_err();
    assert!(err.downcast_ref::<BarError>().is_some_and(BarError::is_unfulfillable));
    let saved = MemoryCatalog::load(&path).unwrap();
    assert_eq!(saved.order(1).unwrap().recipe_id, 2);

    barbot(&path, &["assign", "--dispenser", "2", "--ingredient", "4"]).await.unwrap();
    let saved = MemoryCatalog::load(&path).unwrap();
    assert_eq!(
        saved.current_dispenser(4).unwrap(),
        Some(DispenserSlot { rail_position: 7, dispenser_id: 2 })
    );

    barbot(&path, &["compile", "--order", "1"]).await.unwrap();

    barbot(&path, &["assign", "--dispenser", "2", "--empty"]).await.unwrap();
    assert_eq!(MemoryCatalog::load(&path).unwrap().current_dispenser(4).unwrap(), None);
}

#[tokio::test]
async fn mismatched_assignment_leaves_file_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bar.json");
    std::fs::write(&path, BAR).unwrap();

    assert!(barbot(&path, &["assign", "--dispenser", "3", "--ingredient", "4"]).await.is_err());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), BAR);
}
