//! Schema reported to the host by `GetSchema`.

use crate::constants::{
    DEFAULT_CLUSTER_SIZE, DEFAULT_DISCOVERY_ENDPOINT, DISCOVERY_RESOURCE, KEYS_RESOURCE,
};
use crate::proto::{Attribute, Block, NestedBlock, ProviderSchema};
use std::collections::HashMap;

const STRING: &str = "string";
const BOOL: &str = "bool";
const NUMBER: &str = "number";
const STRING_MAP: &str = "map(string)";

fn attribute(name: &str, kind: &str, description: &str) -> Attribute {
    Attribute {
        name: name.to_string(),
        r#type: kind.to_string(),
        description: description.to_string(),
        ..Default::default()
    }
}

fn required(attr: Attribute) -> Attribute {
    Attribute {
        required: true,
        ..attr
    }
}

fn optional(attr: Attribute) -> Attribute {
    Attribute {
        optional: true,
        ..attr
    }
}

fn computed(attr: Attribute) -> Attribute {
    Attribute {
        computed: true,
        ..attr
    }
}

fn with_default(attr: Attribute, default: impl ToString) -> Attribute {
    Attribute {
        default_value: Some(default.to_string()),
        ..attr
    }
}

fn force_new(attr: Attribute) -> Attribute {
    Attribute {
        force_new: true,
        ..attr
    }
}

/// Provider configuration block.
pub fn provider_block() -> Block {
    Block {
        attributes: vec![required(attribute(
            "endpoint",
            STRING,
            "etcd client URL, e.g. http://127.0.0.1:2379",
        ))],
        blocks: vec![],
    }
}

/// `etcd_keys`: a set of `key` blocks plus the computed `var` map.
pub fn keys_block() -> Block {
    let key = Block {
        attributes: vec![
            required(attribute("name", STRING, "variable name in `var`")),
            required(attribute("path", STRING, "etcd key path")),
            computed(optional(attribute(
                "value",
                STRING,
                "value to write; when unset the stored value is read",
            ))),
            optional(attribute(
                "default",
                STRING,
                "value used when the path holds nothing (string or bool)",
            )),
            with_default(
                optional(attribute(
                    "delete",
                    BOOL,
                    "remove the path from etcd when the resource is destroyed",
                )),
                false,
            ),
        ],
        blocks: vec![],
    };

    Block {
        attributes: vec![computed(attribute(
            "var",
            STRING_MAP,
            "resolved value of every key, by name",
        ))],
        blocks: vec![NestedBlock {
            name: "key".to_string(),
            nesting: "set".to_string(),
            block: Some(key),
        }],
    }
}

/// `etcd_discovery`: endpoint and size in, URL out.
pub fn discovery_block() -> Block {
    Block {
        attributes: vec![
            force_new(with_default(
                optional(attribute("endpoint", STRING, "discovery endpoint")),
                DEFAULT_DISCOVERY_ENDPOINT,
            )),
            force_new(with_default(
                optional(attribute("size", NUMBER, "size of cluster")),
                DEFAULT_CLUSTER_SIZE,
            )),
            computed(attribute("url", STRING, "discovery URL")),
        ],
        blocks: vec![],
    }
}

pub fn provider_schema() -> ProviderSchema {
    ProviderSchema {
        provider: Some(provider_block()),
        resources: HashMap::from([
            (KEYS_RESOURCE.to_string(), keys_block()),
            (DISCOVERY_RESOURCE.to_string(), discovery_block()),
        ]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find<'a>(block: &'a Block, name: &str) -> &'a Attribute {
        block
            .attributes
            .iter()
            .find(|attr| attr.name == name)
            .unwrap_or_else(|| panic!("missing attribute {name}"))
    }

    #[test]
    fn lists_both_resources() {
        let schema = provider_schema();
        assert!(schema.resources.contains_key("etcd_keys"));
        assert!(schema.resources.contains_key("etcd_discovery"));
        assert!(find(schema.provider.as_ref().unwrap(), "endpoint").required);
    }

    #[test]
    fn key_block_shape() {
        let keys = keys_block();
        assert!(find(&keys, "var").computed);

        let key = keys.blocks[0].block.as_ref().unwrap();
        assert_eq!(keys.blocks[0].nesting, "set");
        assert!(find(key, "name").required);
        assert!(find(key, "path").required);
        assert_eq!(find(key, "delete").default_value.as_deref(), Some("false"));
        assert!(!find(key, "default").required);
    }

    #[test]
    fn discovery_defaults() {
        let block = discovery_block();
        let endpoint = find(&block, "endpoint");
        assert_eq!(
            endpoint.default_value.as_deref(),
            Some("https://discovery.etcd.io/new")
        );
        assert!(endpoint.force_new);
        assert_eq!(find(&block, "size").default_value.as_deref(), Some("3"));
        assert!(find(&block, "url").computed);
    }
}
