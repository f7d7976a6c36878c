//! Serde types for the game's blockstate and model JSON, plus the
//! selection rules that take a block state to a single model and texture.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct Variant {
    pub model: String,
}

/// A variant entry is either one object or a list of alternatives.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum Variants {
    Single(Variant),
    Many(Vec<Variant>),
}

impl Variants {
    pub fn first(&self) -> Option<&Variant> {
        match self {
            Variants::Single(v) => Some(v),
            Variants::Many(vs) => vs.first(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "lowercase")]
pub enum Blockstate {
    Variants(HashMap<String, Variants>),
    Multipart(Vec<Part>),
}

/// One case of a multipart blockstate. The `when` condition is decoded so
/// the data is not lost, but model selection does not evaluate it yet.
#[derive(Deserialize, Debug, Clone)]
pub struct Part {
    pub when: Option<serde_json::Value>,
    pub apply: Variants,
}

/// The slice of a model JSON we care about: its texture table. Parent
/// resolution is not needed for top-down colors.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct Model {
    pub parent: Option<String>,

    #[serde(default)]
    pub textures: HashMap<String, String>,
}

impl Blockstate {
    /// Pick the model for a block with the given properties.
    ///
    /// Multipart states take the first part's first `apply` model
    /// unconditionally.
    // TODO: evaluate multipart `when` clauses (including OR groups) and
    // union the matching parts instead of taking the first.
    pub fn model_for<'a>(&'a self, properties: &BTreeMap<String, String>) -> Option<&'a str> {
        match self {
            Blockstate::Multipart(parts) => parts
                .first()
                .and_then(|part| part.apply.first())
                .map(|v| v.model.as_str()),
            Blockstate::Variants(variants) if variants.len() == 1 => variants
                .values()
                .next()
                .and_then(Variants::first)
                .map(|v| v.model.as_str()),
            Blockstate::Variants(variants) => variants
                .iter()
                .find(|(selector, _)| selector_matches(selector, properties))
                .and_then(|(_, vs)| vs.first())
                .map(|v| v.model.as_str()),
        }
    }
}

/// A variant selector is a comma-separated list of `key=value` pairs; it
/// matches when every pair is present in the block's properties.
fn selector_matches(selector: &str, properties: &BTreeMap<String, String>) -> bool {
    selector.split(',').all(|pair| {
        let mut kv = pair.splitn(2, '=');
        match (kv.next(), kv.next()) {
            (Some(k), Some(v)) => properties.get(k).map(String::as_str) == Some(v),
            _ => false,
        }
    })
}

impl Model {
    /// The texture a top-down render should use, by priority: a sole
    /// entry, then `top`, `all`, `texture`, then whatever comes first.
    pub fn pick_texture(&self) -> Option<&str> {
        if self.textures.len() == 1 {
            return self.textures.values().next().map(String::as_str);
        }

        for key in ["top", "all", "texture"] {
            if let Some(name) = self.textures.get(key) {
                return Some(name);
            }
        }

        self.textures.values().next().map(String::as_str)
    }
}

/// Split a possibly-namespaced identifier into (namespace, rest).
pub fn split_namespace(id: &str) -> (&str, &str) {
    match id.split_once(':') {
        Some((ns, rest)) => (ns, rest),
        None => ("minecraft", id),
    }
}
