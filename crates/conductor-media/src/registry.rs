//! Emoji registry (C8): guild-scoped and global emoji name→id tables.
//!
//! Sticker info is declared but intentionally left unimplemented — the
//! source this was distilled from never finished that registry either.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmojiEntry {
    pub name: String,
    pub id: String,
    pub animated: bool,
}

impl EmojiEntry {
    /// Render the full Discord token, e.g. `<:wave:123>` or `<a:wave:123>`.
    pub fn token(&self) -> String {
        if self.animated {
            format!("<a:{}:{}>", self.name, self.id)
        } else {
            format!("<:{}:{}>", self.name, self.id)
        }
    }
}

/// Global entries plus a per-guild overlay. Guild entries win on name
/// collision; lookups with no `guild_id` only ever see the global table.
#[derive(Debug, Default)]
pub struct EmojiRegistry {
    global: HashMap<String, EmojiEntry>,
    guilds: HashMap<String, HashMap<String, EmojiEntry>>,
}

impl EmojiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_global(&mut self, entry: EmojiEntry) {
        self.global.insert(entry.name.clone(), entry);
    }

    pub fn insert_guild(&mut self, guild_id: impl Into<String>, entry: EmojiEntry) {
        self.guilds.entry(guild_id.into()).or_default().insert(entry.name.clone(), entry);
    }

    /// Resolve `name`, preferring a guild-scoped match over the global table.
    pub fn resolve(&self, guild_id: Option<&str>, name: &str) -> Option<&EmojiEntry> {
        if let Some(gid) = guild_id {
            if let Some(entry) = self.guilds.get(gid).and_then(|g| g.get(name)) {
                return Some(entry);
            }
        }
        self.global.get(name)
    }

    /// A name→entry view with guild entries overriding global ones on
    /// collision, for prompt-context rendering.
    fn merged_view(&self, guild_id: Option<&str>) -> HashMap<&str, &EmojiEntry> {
        let mut merged: HashMap<&str, &EmojiEntry> = self.global.iter().map(|(k, v)| (k.as_str(), v)).collect();
        if let Some(gid) = guild_id {
            if let Some(guild_entries) = self.guilds.get(gid) {
                for (name, entry) in guild_entries {
                    merged.insert(name.as_str(), entry);
                }
            }
        }
        merged
    }

    /// Render a prompt-context block listing available emoji and their
    /// display tokens, sorted by name for deterministic prompts.
    pub fn prompt_context(&self, guild_id: Option<&str>) -> String {
        let merged = self.merged_view(guild_id);
        if merged.is_empty() {
            return String::new();
        }
        let mut names: Vec<&&str> = merged.keys().collect();
        names.sort();
        let mut lines = vec!["Available emoji:".to_string()];
        for name in names {
            let entry = merged[name];
            lines.push(format!("- :{name}: -> {}", entry.token()));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, id: &str) -> EmojiEntry {
        EmojiEntry {
            name: name.to_string(),
            id: id.to_string(),
            animated: false,
        }
    }

    #[test]
    fn guild_entry_overrides_global_on_name_collision() {
        let mut registry = EmojiRegistry::new();
        registry.insert_global(entry("wave", "1"));
        registry.insert_guild("g1", entry("wave", "2"));
        assert_eq!(registry.resolve(Some("g1"), "wave").unwrap().id, "2");
        assert_eq!(registry.resolve(None, "wave").unwrap().id, "1");
    }

    #[test]
    fn missing_guild_falls_back_to_global() {
        let mut registry = EmojiRegistry::new();
        registry.insert_global(entry("wave", "1"));
        assert_eq!(registry.resolve(Some("other-guild"), "wave").unwrap().id, "1");
    }

    #[test]
    fn prompt_context_lists_merged_tokens_sorted() {
        let mut registry = EmojiRegistry::new();
        registry.insert_global(entry("zeta", "9"));
        registry.insert_global(entry("alpha", "1"));
        let ctx = registry.prompt_context(None);
        let alpha_pos = ctx.find("alpha").unwrap();
        let zeta_pos = ctx.find("zeta").unwrap();
        assert!(alpha_pos < zeta_pos);
    }
}
