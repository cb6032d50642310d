use color_eyre::eyre::{Result, eyre};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::props::PlayerId;

/// Placeholder replaced by the buyer's player id.
pub const PLAYER_ID_TOKEN: &str = "{steam_id}";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct CommandTemplate(String);

impl CommandTemplate {
    pub fn new(template: &str) -> Self {
        CommandTemplate(template.to_owned())
    }

    pub fn render(&self, player_id: &PlayerId) -> String {
        self.0.replace(PLAYER_ID_TOKEN, player_id)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CatalogItem {
    pub name: String,
    pub price: Decimal,
    pub command: CommandTemplate,
}

pub struct Catalog {
    items: Vec<CatalogItem>,
}

impl Catalog {
    pub fn new(items: Vec<CatalogItem>) -> Result<Self> {
        if let Some(item) = items.iter().find(|i| i.price <= Decimal::ZERO) {
            return Err(eyre!("Catalog item '{}' has a non-positive price", item.name));
        }

        Ok(Catalog { items })
    }

    pub fn find(&self, name: &str) -> Option<&CatalogItem> {
        let name = name.trim();
        self.items.iter().find(|i| i.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::dec;

    use super::*;

    fn item(name: &str, price: Decimal) -> CatalogItem {
        CatalogItem {
            name: name.to_owned(),
            price,
            command: CommandTemplate::new("GiveItemToPlayer {steam_id} 1 0 0"),
        }
    }

    #[test]
    fn renders_every_placeholder() {
        let template = CommandTemplate::new("Tp {steam_id} && Heal {steam_id}");
        let player = PlayerId::parse("76561198000000001").unwrap();

        assert_eq!(
            template.render(&player),
            "Tp 76561198000000001 && Heal 76561198000000001"
        );
    }

    #[test]
    fn finds_items_ignoring_case() {
        let catalog = Catalog::new(vec![item("Rex Saddle", dec!(40))]).unwrap();

        assert_eq!(catalog.find(" rex saddle").map(|i| i.price), Some(dec!(40)));
        assert!(catalog.find("Raptor Saddle").is_none());
    }

    #[test]
    fn rejects_free_items() {
        let err = Catalog::new(vec![item("Freebie", dec!(0))]).err().unwrap();

        assert!(err.to_string().contains("Freebie"));
    }

    #[test]
    fn parses_from_config_json() {
        let parsed: CatalogItem = serde_json::from_str(
            r#"{ "name": "Rex Saddle", "price": 40, "command": "GiveItemToPlayer {steam_id} saddle" }"#,
        )
        .unwrap();

        assert_eq!(parsed, CatalogItem {
            name: "Rex Saddle".to_owned(),
            price: dec!(40),
            command: CommandTemplate::new("GiveItemToPlayer {steam_id} saddle"),
        });
    }
}
