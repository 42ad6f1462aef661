//! Output repair (C8): idempotent rewriting of malformed emoji tokens, plus
//! a streaming variant that never splits a token across flush boundaries.

use crate::registry::EmojiRegistry;

/// Rewrite malformed emoji tokens in `text` into valid Discord tokens.
/// Idempotent: `repair(repair(x)) == repair(x)`, since an already-valid
/// `<:name:id>`/`<a:name:id>` token is recognized and left untouched.
pub fn repair(text: &str, registry: &EmojiRegistry, guild_id: Option<&str>) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '<' {
            if let Some((consumed, rendered)) = try_angle_token(&chars[i..], registry, guild_id) {
                out.push_str(&rendered);
                i += consumed;
                continue;
            }
        }
        if chars[i] == ':' {
            if let Some((consumed, rendered)) = try_bare_token(&chars[i..], registry, guild_id) {
                out.push_str(&rendered);
                i += consumed;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// Parse `<name:id>`-family tokens starting at `chars[0] == '<'`. Returns the
/// number of chars consumed and the text to emit in their place, or `None`
/// if this isn't a recognizable token (caller treats `<` as a literal char).
fn try_angle_token(chars: &[char], registry: &EmojiRegistry, guild_id: Option<&str>) -> Option<(usize, String)> {
    let mut idx = 1;
    let animated = chars.get(idx) == Some(&'a') && chars.get(idx + 1) == Some(&':');
    if animated {
        idx += 2;
    } else if chars.get(idx) == Some(&':') {
        idx += 1;
    } else {
        return None;
    }

    let name_start = idx;
    while chars.get(idx).is_some_and(|c| c.is_alphanumeric() || *c == '_') {
        idx += 1;
    }
    if idx == name_start || chars.get(idx) != Some(&':') {
        return None;
    }
    let name: String = chars[name_start..idx].iter().collect();
    idx += 1; // consume the closing ':'

    match chars.get(idx) {
        Some('>') => {
            // Half-form `<:name:>` / `<a:name:>` — needs an id filled in.
            let rendered = match registry.resolve(guild_id, &name) {
                Some(entry) => entry.token(),
                None => chars[..idx + 1].iter().collect(),
            };
            Some((idx + 1, rendered))
        }
        Some(c) if c.is_ascii_digit() => {
            let id_start = idx;
            while chars.get(idx).is_some_and(|c| c.is_ascii_digit()) {
                idx += 1;
            }
            if chars.get(idx) == Some(&'>') {
                // Already a fully-formed, valid token — leave untouched.
                let _id_end = idx;
                let rendered: String = chars[..idx + 1].iter().collect();
                let _ = id_start;
                Some((idx + 1, rendered))
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Parse a bare `:name:` not already part of an angle token. Returns `None`
/// (leave as literal text) when the name doesn't resolve uniquely.
fn try_bare_token(chars: &[char], registry: &EmojiRegistry, guild_id: Option<&str>) -> Option<(usize, String)> {
    let mut idx = 1;
    let name_start = idx;
    while chars.get(idx).is_some_and(|c| c.is_alphanumeric() || *c == '_') {
        idx += 1;
    }
    if idx == name_start || chars.get(idx) != Some(&':') {
        return None;
    }
    let name: String = chars[name_start..idx].iter().collect();
    let entry = registry.resolve(guild_id, &name)?;
    Some((idx + 1, entry.token()))
}

/// Buffers streaming output across flush boundaries so an emoji token is
/// never split across two chunks. Call `feed` per chunk and `flush` once at
/// stream end to drain anything still buffered.
#[derive(Default)]
pub struct StreamRepairer {
    pending: String,
}

impl StreamRepairer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk, returning the portion safe to deliver now. Any
    /// suspected partial token at the tail is held back until a later call
    /// completes it (or `flush` forces it out as-is).
    pub fn feed(&mut self, chunk: &str, registry: &EmojiRegistry, guild_id: Option<&str>) -> String {
        self.pending.push_str(chunk);
        let (safe, rest) = split_at_pending_token(&self.pending);
        let safe = safe.to_string();
        self.pending = rest.to_string();
        repair(&safe, registry, guild_id)
    }

    /// Flush whatever remains buffered, repairing it as-is (a token that
    /// never completed is emitted literally rather than dropped).
    pub fn flush(&mut self, registry: &EmojiRegistry, guild_id: Option<&str>) -> String {
        let remainder = std::mem::take(&mut self.pending);
        repair(&remainder, registry, guild_id)
    }
}

/// Split `s` into a safe-to-emit prefix and a suspected-partial-token
/// suffix. A partial token is an unterminated `<...` run, or a trailing bare
/// `:identifier` with no closing colon yet.
fn split_at_pending_token(s: &str) -> (&str, &str) {
    if let Some(lt_idx) = s.rfind('<') {
        if !s[lt_idx..].contains('>') {
            return (&s[..lt_idx], &s[lt_idx..]);
        }
    }
    if let Some(colon_idx) = s.rfind(':') {
        let after = &s[colon_idx + 1..];
        if !after.is_empty() && !after.contains(':') && after.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return (&s[..colon_idx], &s[colon_idx..]);
        }
    }
    (s, "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::EmojiEntry;

    fn registry_with_wave() -> EmojiRegistry {
        let mut registry = EmojiRegistry::new();
        registry.insert_global(EmojiEntry {
            name: "wave".to_string(),
            id: "123".to_string(),
            animated: false,
        });
        registry
    }

    #[test]
    fn bare_token_resolves_to_full_form() {
        let registry = registry_with_wave();
        let out = repair("hi :wave: there", &registry, None);
        assert_eq!(out, "hi <:wave:123> there");
    }

    #[test]
    fn half_form_token_gets_id_filled_in() {
        let registry = registry_with_wave();
        let out = repair("hi <:wave:> there", &registry, None);
        assert_eq!(out, "hi <:wave:123> there");
    }

    #[test]
    fn unresolvable_name_is_left_unchanged() {
        let registry = registry_with_wave();
        let out = repair("hi :unknown: there", &registry, None);
        assert_eq!(out, "hi :unknown: there");
    }

    #[test]
    fn repair_is_idempotent() {
        let registry = registry_with_wave();
        let once = repair("hi :wave: <:wave:> bye", &registry, None);
        let twice = repair(&once, &registry, None);
        assert_eq!(once, twice);
    }

    #[test]
    fn already_valid_token_is_untouched() {
        let registry = registry_with_wave();
        let out = repair("hi <:wave:123> there", &registry, None);
        assert_eq!(out, "hi <:wave:123> there");
    }

    #[test]
    fn stream_repairer_holds_partial_angle_token_across_chunks() {
        let registry = registry_with_wave();
        let mut repairer = StreamRepairer::new();
        let first = repairer.feed("Hi ", &registry, None);
        let second = repairer.feed(":wa", &registry, None);
        let third = repairer.feed("ve: there", &registry, None);
        assert_eq!(first, "Hi ");
        assert_eq!(second, "");
        assert_eq!(third, "<:wave:123> there");
    }

    #[test]
    fn flush_emits_unterminated_token_literally() {
        let registry = registry_with_wave();
        let mut repairer = StreamRepairer::new();
        let _ = repairer.feed("trailing <:wav", &registry, None);
        let flushed = repairer.flush(&registry, None);
        assert_eq!(flushed, "<:wav");
    }
}
