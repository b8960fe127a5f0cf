//! Wire codec for the `fs_experiments` cookie.
//!
//! ## Wire format
//!
//! ```text
//! u=<userId>,<record>[&<record>]*
//!
//! record (v1, legacy):   a=<app>,s=<stamp>,v=<bitstring>,b=<bucket>
//! record (v2):           a=<app>,s=<stamp>,e=2,f=<pairs>,b=<bucket>
//! pairs:                 <name>:<0|1>[~<name>:<0|1>]*
//! ```
//!
//! Records are `&`-separated; fields inside a record are `,`-separated
//! `key=value` tokens in any order. In a v1 record the bitstring is
//! positional: character *i* is the value of the *i*-th feature in the
//! template registry's declared order for that app, so v1 records can only
//! be decoded when a template is registered — otherwise they are carried as
//! opaque blobs and echoed back verbatim. v2 records are self-describing
//! (`e=2` version tag, explicit name:value pairs) and need no template;
//! encoding always emits v2.
//!
//! Decoding never fails hard: no `u=` marker means "no prior assignment"
//! and any record parse failure degrades the whole decode to the empty
//! state. Feature-flag evaluation must never take a page down.

use crate::state::{AppExperiments, AppRecord, FeatureValue, GlobalExperimentState, OrderedMap};
use crate::template::TemplateRegistry;

/// Version tag emitted on every encoded record.
const WIRE_VERSION: &str = "2";

/// Internal per-record parse failure. Never escapes [`decode`].
#[derive(Debug, PartialEq, Eq)]
pub enum RecordError {
    /// A field was not a `key=value` token.
    BadField(String),
    /// A v2 pair was not `<name>:<0|1>`.
    BadPair(String),
    /// A record carried no `a=<app>` field.
    MissingApp,
    /// A name appeared both as a scalar flag and as a variant set.
    MixedShape(String),
}

impl std::fmt::Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordError::BadField(field) => write!(f, "malformed field '{field}'"),
            RecordError::BadPair(pair) => write!(f, "malformed feature pair '{pair}'"),
            RecordError::MissingApp => write!(f, "record has no app name"),
            RecordError::MixedShape(name) => {
                write!(f, "feature '{name}' is both a flag and a variant set")
            }
        }
    }
}

impl std::error::Error for RecordError {}

/// Decode a raw cookie value into experiment state.
///
/// Fails soft: empty input, a missing `u=` marker, or any record parse
/// failure all yield the empty state. The first two are "no prior
/// assignment"; the last is logged at debug level.
pub fn decode(raw: &str, templates: &TemplateRegistry) -> GlobalExperimentState {
    match decode_records(raw, templates) {
        Ok(state) => state,
        Err(err) => {
            log::debug!("discarding unreadable experiment cookie: {err}");
            GlobalExperimentState::default()
        }
    }
}

fn decode_records(
    raw: &str,
    templates: &TemplateRegistry,
) -> Result<GlobalExperimentState, RecordError> {
    let mut state = GlobalExperimentState::default();
    if raw.is_empty() {
        return Ok(state);
    }

    let mut chunks = raw.split('&');
    // First chunk carries the user id, optionally followed by the first
    // record after a comma: "u=42,a=myapp,...".
    let head = chunks.next().unwrap_or("");
    let Some(head) = head.strip_prefix("u=") else {
        // No prior assignment; not an error.
        return Ok(state);
    };
    let first_record = match head.split_once(',') {
        Some((user, rest)) => {
            state.user_id = user.to_string();
            Some(rest)
        }
        None => {
            state.user_id = head.to_string();
            None
        }
    };

    for chunk in first_record.into_iter().chain(chunks) {
        if chunk.is_empty() {
            continue;
        }
        let (app, record) = parse_record(chunk, templates)?;
        state.apps.insert(app, record);
    }
    Ok(state)
}

/// Parse one `&`-delimited record chunk.
///
/// A record is kept opaque (echoed back verbatim on encode) when it cannot
/// be decoded without loss: unknown fields, no template for a v1 bitstring,
/// or no feature payload at all.
fn parse_record(
    chunk: &str,
    templates: &TemplateRegistry,
) -> Result<(String, AppRecord), RecordError> {
    let mut app = None;
    let mut stamp = None;
    let mut bucket = None;
    let mut bits = None;
    let mut pairs = None;
    let mut unknown_field = false;

    for field in chunk.split(',') {
        if field.is_empty() {
            continue;
        }
        let (key, value) = field
            .split_once('=')
            .ok_or_else(|| RecordError::BadField(field.to_string()))?;
        match key {
            "a" => app = Some(value),
            "s" => stamp = Some(value),
            "b" => bucket = Some(value),
            "v" => bits = Some(value),
            "f" => pairs = Some(value),
            "e" => {} // version tag; v2 is recognized by the f= payload
            _ => {
                // Written by a newer application version. Decoding would
                // drop the field on re-encode, so keep the record opaque.
                log::debug!("unknown field '{key}' in record, keeping opaque");
                unknown_field = true;
            }
        }
    }

    let app = app.ok_or(RecordError::MissingApp)?.to_string();
    if unknown_field {
        return Ok((app, AppRecord::Opaque(chunk.to_string())));
    }

    let features = if let Some(pairs) = pairs {
        parse_pairs(pairs)?
    } else if let (Some(bits), Some(template)) = (bits, templates.get(&app)) {
        decode_bits(bits, template)
    } else {
        // v1 record without a template, or no feature payload at all.
        return Ok((app, AppRecord::Opaque(chunk.to_string())));
    };

    let record = AppExperiments {
        stamp: stamp.unwrap_or_default().to_string(),
        bucket: bucket.unwrap_or_default().to_string(),
        features,
        dirty: Vec::new(),
    };
    Ok((app, AppRecord::Experiments(record)))
}

/// Decode a v1 positional bitstring against a template's declared order.
///
/// `'1'` is true, anything else (including a missing position when the
/// bitstring is shorter than the template) is false; extra characters are
/// ignored. Both happen when the cookie was written against an older or
/// newer template than the one registered here.
///
/// A variant-shaped template entry decodes to a plain flag meaning "some
/// variant is selected": v1 conflated variant truth into one bit on encode
/// and has no inverse, so no variant-level values are invented here.
fn decode_bits(
    bits: &str,
    template: &crate::template::AppTemplate,
) -> OrderedMap<FeatureValue> {
    let mut features = OrderedMap::new();
    for (i, (name, _shape)) in template.declared().enumerate() {
        let on = bits.as_bytes().get(i) == Some(&b'1');
        features.insert(name, FeatureValue::Flag(on));
    }
    features
}

/// Parse a v2 `f=` payload: `alpha:1~beta:0~theme#red:1`.
fn parse_pairs(pairs: &str) -> Result<OrderedMap<FeatureValue>, RecordError> {
    let mut features = OrderedMap::new();
    if pairs.is_empty() {
        return Ok(features);
    }

    for pair in pairs.split('~') {
        let (name, bit) = pair
            .split_once(':')
            .ok_or_else(|| RecordError::BadPair(pair.to_string()))?;
        let on = match bit {
            "1" => true,
            "0" => false,
            _ => return Err(RecordError::BadPair(pair.to_string())),
        };

        if let Some((base, variant)) = name.split_once('#') {
            if !features.contains_key(base) {
                let mut variants = OrderedMap::new();
                variants.insert(variant, on);
                features.insert(base, FeatureValue::Variants(variants));
            } else {
                match features.get_mut(base) {
                    Some(FeatureValue::Variants(variants)) => variants.insert(variant, on),
                    _ => return Err(RecordError::MixedShape(base.to_string())),
                }
            }
        } else {
            if matches!(features.get(name), Some(FeatureValue::Variants(_))) {
                return Err(RecordError::MixedShape(name.to_string()));
            }
            features.insert(name, FeatureValue::Flag(on));
        }
    }
    Ok(features)
}

/// Encode experiment state back to the raw cookie value.
///
/// Deterministic given the state's iteration order (wire order on decode,
/// then insertion order for features added since). Decoded records are
/// emitted as v2; opaque records are echoed byte-for-byte. Dirty lists are
/// session-local instrumentation and are not encoded.
pub fn encode(state: &GlobalExperimentState) -> String {
    let mut out = format!("u={}", state.user_id);
    for (i, (app, record)) in state.apps.iter().enumerate() {
        out.push(if i == 0 { ',' } else { '&' });
        match record {
            AppRecord::Opaque(blob) => out.push_str(blob),
            AppRecord::Experiments(exp) => {
                out.push_str(&format!(
                    "a={app},s={stamp},e={WIRE_VERSION},f={pairs},b={bucket}",
                    stamp = exp.stamp,
                    pairs = encode_pairs(&exp.features),
                    bucket = exp.bucket,
                ));
            }
        }
    }
    out
}

fn encode_pairs(features: &OrderedMap<FeatureValue>) -> String {
    let mut pairs = Vec::new();
    for (name, value) in features.iter() {
        match value {
            FeatureValue::Flag(on) => pairs.push(format!("{name}:{}", bit(*on))),
            FeatureValue::Variants(variants) => {
                for (variant, &on) in variants.iter() {
                    pairs.push(format!("{name}#{variant}:{}", bit(on)));
                }
            }
        }
    }
    pairs.join("~")
}

#[inline]
fn bit(on: bool) -> char {
    if on {
        '1'
    } else {
        '0'
    }
}
