//! Stage 4: assign each candidate tuple to exactly one entity or route it
//! to the unresolved queue. Two passes:
//!
//! 1. Explicit — single-candidate mentions resolve outright; shared
//!    surfaces are disambiguated by a weighted context signal and must
//!    clear both a confidence floor and a margin over the runner-up.
//! 2. Implicit — pronoun sentences in documents that already have an
//!    explicit resolution are attributed to the document's primary entity
//!    at a reduced weight.
//!
//! The resolver never invents entities: a surface that fails the margin
//! goes to the queue with its candidate snapshot and contributes nothing
//! downstream.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use limelight_catalog::Catalog;
use limelight_common::{
    config::ResolverWeights, content_hash, normalize_surface,
    text::{find_pronoun, tokens},
    CandidateScore, CatalogEntry, Document, EntityType, Mention, Source, SourceItem,
    UnresolvedMention,
};
use tracing::info;

use super::extract::DocCandidates;

pub struct ResolveOutput {
    pub mentions: Vec<Mention>,
    pub unresolved: Vec<UnresolvedMention>,
}

pub fn run(
    documents: &[Document],
    candidates: &[DocCandidates],
    catalog: &Catalog,
    items_by_id: &HashMap<String, SourceItem>,
    weights: &ResolverWeights,
    implicit_weight: f64,
    now: DateTime<Utc>,
) -> ResolveOutput {
    let docs_by_id: HashMap<&str, &Document> =
        documents.iter().map(|d| (d.doc_id.as_str(), d)).collect();
    let related = related_pairs(catalog);

    let mut mentions = Vec::new();
    let mut unresolved = Vec::new();

    for doc_candidates in candidates {
        let Some(doc) = docs_by_id.get(doc_candidates.doc_id.as_str()) else {
            continue;
        };
        let source = items_by_id.get(&doc.item_id).map(|i| i.source);
        resolve_document(
            doc,
            doc_candidates,
            catalog,
            source,
            &related,
            weights,
            implicit_weight,
            now,
            &mut mentions,
            &mut unresolved,
        );
    }

    mentions.sort_by(|a, b| a.mention_id.cmp(&b.mention_id));
    unresolved.sort_by(|a, b| a.unresolved_id.cmp(&b.unresolved_id));
    info!(
        resolved = mentions.len(),
        unresolved = unresolved.len(),
        "Resolution complete"
    );
    ResolveOutput {
        mentions,
        unresolved,
    }
}

fn related_pairs(catalog: &Catalog) -> HashSet<(String, String)> {
    let mut set = HashSet::new();
    for rel in &catalog.relationships {
        set.insert((rel.from_entity_id.clone(), rel.to_entity_id.clone()));
        set.insert((rel.to_entity_id.clone(), rel.from_entity_id.clone()));
    }
    set
}

#[allow(clippy::too_many_arguments)]
fn resolve_document(
    doc: &Document,
    doc_candidates: &DocCandidates,
    catalog: &Catalog,
    source: Option<Source>,
    related: &HashSet<(String, String)>,
    weights: &ResolverWeights,
    implicit_weight: f64,
    now: DateTime<Utc>,
    mentions: &mut Vec<Mention>,
    unresolved: &mut Vec<UnresolvedMention>,
) {
    let mut resolved_in_doc: Vec<String> = Vec::new();
    let mut explicit_sentences: HashSet<usize> = HashSet::new();
    // entity_id → (explicit count, first span start)
    let mut explicit_stats: HashMap<String, (usize, usize)> = HashMap::new();

    // --- Explicit pass ---
    for m in &doc_candidates.matches {
        let sentence = sentence_text(doc, doc_candidates, m.sent_idx);

        let (entity_id, confidence) = if m.alias.candidates.len() == 1 {
            (Some(m.alias.candidates[0].clone()), 1.0)
        } else {
            let matched_norm = normalize_surface(&m.alias.surface);
            let mut scored: Vec<CandidateScore> = m
                .alias
                .candidates
                .iter()
                .filter_map(|id| catalog.get(id))
                .map(|entry| {
                    score_candidate(
                        entry,
                        doc,
                        sentence,
                        &matched_norm,
                        source,
                        &resolved_in_doc,
                        related,
                        weights,
                    )
                })
                .collect();
            scored.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.entity_id.cmp(&b.entity_id))
            });
            scored.truncate(weights.max_candidates);

            let top = scored.first().map(|c| c.score).unwrap_or(0.0);
            let second = scored.get(1).map(|c| c.score).unwrap_or(0.0);
            let margin = weights.margin_fraction * top;

            if top >= weights.min_confidence && (top - second) >= margin {
                (Some(scored[0].entity_id.clone()), top.clamp(0.0, 1.0))
            } else {
                let surface_norm = normalize_surface(&m.alias.surface);
                unresolved.push(UnresolvedMention {
                    unresolved_id: format!(
                        "u_{}",
                        &content_hash(&format!(
                            "{}|{}|{surface_norm}",
                            doc.doc_id, m.sent_idx
                        ))[..20]
                    ),
                    doc_id: doc.doc_id.clone(),
                    surface: m.alias.surface.clone(),
                    surface_norm,
                    sent_idx: m.sent_idx,
                    context: snippet(&doc.text_title, sentence),
                    candidates: scored,
                    top_score: top,
                    second_score: second,
                    created_at: now,
                });
                (None, 0.0)
            }
        };

        let Some(entity_id) = entity_id else { continue };
        explicit_sentences.insert(m.sent_idx);
        let stats = explicit_stats
            .entry(entity_id.clone())
            .or_insert((0, m.alias.span_start));
        stats.0 += 1;
        resolved_in_doc.push(entity_id.clone());

        mentions.push(Mention {
            mention_id: mention_id(doc, m.sent_idx, m.alias.span_start, &entity_id, false),
            doc_id: doc.doc_id.clone(),
            entity_id,
            sent_idx: m.sent_idx,
            span_start: m.alias.span_start,
            span_end: m.alias.span_end,
            surface: m.alias.surface.clone(),
            is_implicit: false,
            weight: 1.0,
            resolve_confidence: confidence,
            features: Default::default(),
        });
    }

    // --- Implicit pass ---
    // Highest explicit count wins; ties break toward the earlier first
    // appearance. Documents with no explicit resolution attribute nothing.
    let Some(primary) = explicit_stats
        .iter()
        .map(|(id, &(count, first_span))| (id.clone(), count, first_span))
        .max_by(|a, b| a.1.cmp(&b.1).then(b.2.cmp(&a.2)).then(b.0.cmp(&a.0)))
        .map(|(id, _, _)| id)
    else {
        return;
    };

    for (sent_idx, &(start, end)) in doc_candidates.sentences.iter().enumerate() {
        if explicit_sentences.contains(&sent_idx) {
            continue;
        }
        let sentence = &doc.text_all[start..end];
        let Some((p_start, p_end, pronoun)) = find_pronoun(sentence) else {
            continue;
        };
        mentions.push(Mention {
            mention_id: mention_id(doc, sent_idx, start + p_start, &primary, true),
            doc_id: doc.doc_id.clone(),
            entity_id: primary.clone(),
            sent_idx,
            span_start: start + p_start,
            span_end: start + p_end,
            surface: pronoun.to_string(),
            is_implicit: true,
            weight: implicit_weight,
            resolve_confidence: 1.0,
            features: Default::default(),
        });
    }
}

fn mention_id(
    doc: &Document,
    sent_idx: usize,
    span_start: usize,
    entity_id: &str,
    implicit: bool,
) -> String {
    format!(
        "m_{}",
        &content_hash(&format!(
            "{}|{sent_idx}|{span_start}|{entity_id}|{implicit}",
            doc.doc_id
        ))[..20]
    )
}

fn sentence_text<'a>(doc: &'a Document, dc: &DocCandidates, sent_idx: usize) -> &'a str {
    dc.sentences
        .get(sent_idx)
        .map(|&(s, e)| &doc.text_all[s..e])
        .unwrap_or("")
}

fn snippet(title: &str, sentence: &str) -> String {
    let joined = if title.is_empty() {
        sentence.to_string()
    } else {
        format!("{title} | {sentence}")
    };
    joined.chars().take(280).collect()
}

/// Weighted context signal for one candidate of a shared surface.
#[allow(clippy::too_many_arguments)]
fn score_candidate(
    entry: &CatalogEntry,
    doc: &Document,
    sentence: &str,
    matched_norm: &str,
    source: Option<Source>,
    resolved_in_doc: &[String],
    related: &HashSet<(String, String)>,
    weights: &ResolverWeights,
) -> CandidateScore {
    let entity_id = &entry.entity.entity_id;

    // Caption/title co-occurrence of the candidate's OTHER aliases carries
    // the most context weight; the matched surface itself proves nothing.
    let title_zone = normalize_surface(&format!("{} {}", doc.text_title, doc.text_caption));
    let title_hit = entry
        .aliases
        .iter()
        .map(|a| normalize_surface(a))
        .filter(|norm| !norm.is_empty() && norm != matched_norm)
        .any(|norm| contains_phrase(&title_zone, &norm));

    let hint_toks: HashSet<String> = tokens(&entry.entity.context_hints.join(" "))
        .into_iter()
        .collect();
    let hint_overlap = if hint_toks.is_empty() {
        0.0
    } else {
        let local: HashSet<String> = tokens(&format!(
            "{} {} {sentence}",
            doc.text_title, doc.text_caption
        ))
        .into_iter()
        .chain(tokens(&doc.text_body))
        .collect();
        hint_toks.intersection(&local).count() as f64 / hint_toks.len() as f64
    };
    let context = 0.6 * if title_hit { 1.0 } else { 0.0 } + 0.4 * hint_overlap;

    let comention = if resolved_in_doc.contains(entity_id) {
        1.0
    } else if resolved_in_doc
        .iter()
        .any(|other| related.contains(&(entity_id.clone(), other.clone())))
    {
        0.5
    } else {
        0.0
    };

    let typefit = type_fit(entry.entity.entity_type, sentence);

    let source_signal = match source {
        Some(Source::Youtube) => 1.0,
        Some(Source::Gdelt) => 0.8,
        _ => 0.6,
    };

    let score = weights.prior * entry.prior_weight
        + weights.context * context
        + weights.comention * comention
        + weights.typefit * typefit
        + weights.source * source_signal;

    let mut features = HashMap::new();
    features.insert("prior".to_string(), entry.prior_weight);
    features.insert("context".to_string(), context);
    features.insert("comention".to_string(), comention);
    features.insert("typefit".to_string(), typefit);
    features.insert("source".to_string(), source_signal);

    CandidateScore {
        entity_id: entity_id.clone(),
        score,
        features,
    }
}

/// Type constraints from surrounding keywords.
fn type_fit(entity_type: EntityType, sentence: &str) -> f64 {
    let s = sentence.to_lowercase();
    let show_cue = ["season", "episode", "watched", "finale", "series"]
        .iter()
        .any(|k| s.contains(k));
    let film_cue = ["directed", "box office", "film", "movie", "trailer"]
        .iter()
        .any(|k| s.contains(k));
    let person_cue = ["starring", "cast", "actor", "actress", "interview"]
        .iter()
        .any(|k| s.contains(k));

    if show_cue {
        return match entity_type {
            EntityType::Show | EntityType::Franchise => 1.0,
            _ => 0.3,
        };
    }
    if film_cue {
        return match entity_type {
            EntityType::Film | EntityType::Franchise => 1.0,
            _ => 0.3,
        };
    }
    if person_cue {
        return match entity_type {
            EntityType::Person | EntityType::Character => 1.0,
            _ => 0.3,
        };
    }
    0.5
}

/// Whole-phrase containment over normalized text.
fn contains_phrase(haystack_norm: &str, needle_norm: &str) -> bool {
    let h: Vec<&str> = haystack_norm.split(' ').collect();
    let n: Vec<&str> = needle_norm.split(' ').collect();
    if n.is_empty() || h.len() < n.len() {
        return false;
    }
    h.windows(n.len()).any(|w| w == n.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::extract;
    use chrono::{TimeZone, Utc};
    use limelight_catalog::AliasIndex;
    use limelight_common::{CatalogEntry, Entity, EntityType};
    use std::collections::HashMap;

    fn entry(
        id: &str,
        name: &str,
        aliases: &[&str],
        t: EntityType,
        pinned: bool,
        hints: &[&str],
    ) -> CatalogEntry {
        CatalogEntry {
            entity: Entity {
                entity_id: id.to_string(),
                entity_key: id.to_string(),
                canonical_name: name.to_string(),
                entity_type: t,
                is_pinned: pinned,
                is_active: true,
                first_seen_at: None,
                last_seen_at: None,
                dormant_since: None,
                external_ids: Default::default(),
                context_hints: hints.iter().map(|h| h.to_string()).collect(),
                metadata: serde_json::Value::Null,
            },
            aliases: std::iter::once(name)
                .chain(aliases.iter().copied())
                .map(str::to_string)
                .collect(),
            prior_weight: if pinned { 1.0 } else { 0.5 },
        }
    }

    fn doc(doc_id: &str, title: &str, body: &str) -> Document {
        let text_all = if body.is_empty() {
            title.to_string()
        } else {
            format!("{title}\n{body}")
        };
        Document {
            doc_id: doc_id.to_string(),
            item_id: format!("item_{doc_id}"),
            doc_timestamp: Utc.with_ymd_and_hms(2026, 8, 1, 15, 0, 0).unwrap(),
            lang: "en".into(),
            text_title: title.to_string(),
            text_caption: String::new(),
            text_body: body.to_string(),
            text_all,
            quality_flags: Vec::new(),
            hash_sim: doc_id.to_string(),
        }
    }

    fn resolve_docs(catalog: &Catalog, docs: &[Document]) -> ResolveOutput {
        let index = AliasIndex::build(&catalog.entries);
        let candidates = extract::run(docs, &index);
        run(
            docs,
            &candidates,
            catalog,
            &HashMap::new(),
            &limelight_common::config::ResolverWeights::default(),
            0.5,
            Utc.with_ymd_and_hms(2026, 8, 2, 13, 0, 0).unwrap(),
        )
    }

    #[test]
    fn single_candidate_resolves_at_full_confidence() {
        let catalog = Catalog::new(
            vec![entry(
                "person_p1",
                "Alice Example",
                &[],
                EntityType::Person,
                true,
                &[],
            )],
            Vec::new(),
        );
        let out = resolve_docs(&catalog, &[doc("d1", "Alice Example wins award", "")]);
        assert_eq!(out.mentions.len(), 1);
        assert!(out.unresolved.is_empty());
        let m = &out.mentions[0];
        assert_eq!(m.entity_id, "person_p1");
        assert_eq!(m.resolve_confidence, 1.0);
        assert_eq!(m.weight, 1.0);
        assert!(!m.is_implicit);
    }

    #[test]
    fn bare_shared_surface_is_ambiguous() {
        let catalog = Catalog::new(
            vec![
                entry("person_p2", "Jordan One", &["Jordan"], EntityType::Person, true, &[]),
                entry("person_p3", "Jordan Two", &["Jordan"], EntityType::Person, true, &[]),
            ],
            Vec::new(),
        );
        let out = resolve_docs(&catalog, &[doc("d1", "Jordan was great.", "")]);
        assert!(out.mentions.is_empty());
        assert_eq!(out.unresolved.len(), 1);
        let u = &out.unresolved[0];
        assert_eq!(u.candidates.len(), 2);
        assert!((u.top_score - u.second_score).abs() < 1e-9);
        assert_eq!(u.surface_norm, "jordan");
    }

    #[test]
    fn full_name_in_title_disambiguates_body_surface() {
        let catalog = Catalog::new(
            vec![
                entry(
                    "person_p2",
                    "Jordan Vale",
                    &["Jordan"],
                    EntityType::Person,
                    true,
                    &["tennis"],
                ),
                entry(
                    "show_j",
                    "Jordan Falls",
                    &["Jordan"],
                    EntityType::Show,
                    false,
                    &[],
                ),
            ],
            Vec::new(),
        );
        // Title carries the full name; the bare body surface inherits it.
        let out = resolve_docs(
            &catalog,
            &[doc(
                "d1",
                "Jordan Vale interview",
                "Everyone agrees Jordan played tennis brilliantly.",
            )],
        );
        // Two resolutions: the full-name title mention (single candidate)
        // and the disambiguated body mention.
        let body_mentions: Vec<&Mention> = out
            .mentions
            .iter()
            .filter(|m| m.surface == "Jordan")
            .collect();
        assert_eq!(body_mentions.len(), 1);
        assert_eq!(body_mentions[0].entity_id, "person_p2");
        assert!(out.unresolved.is_empty());
    }

    #[test]
    fn implicit_needs_explicit_anchor() {
        let catalog = Catalog::new(
            vec![entry("show_w", "The White Lotus", &[], EntityType::Show, true, &[])],
            Vec::new(),
        );
        // Pronoun sentence with no explicit mention anywhere: nothing.
        let out = resolve_docs(&catalog, &[doc("d1", "Quite the evening", "It was divisive.")]);
        assert!(out.mentions.is_empty());

        // Same pronoun sentence anchored by an explicit title mention.
        let out = resolve_docs(
            &catalog,
            &[doc("d2", "The White Lotus finale", "It was divisive.")],
        );
        assert_eq!(out.mentions.len(), 2);
        let implicit: Vec<&Mention> = out.mentions.iter().filter(|m| m.is_implicit).collect();
        assert_eq!(implicit.len(), 1);
        assert_eq!(implicit[0].entity_id, "show_w");
        assert_eq!(implicit[0].weight, 0.5);
        assert_eq!(implicit[0].surface, "It");
    }

    #[test]
    fn primary_is_highest_count_then_earliest() {
        let catalog = Catalog::new(
            vec![
                entry("person_a", "Ann Vale", &[], EntityType::Person, true, &[]),
                entry("person_b", "Bo Reed", &[], EntityType::Person, true, &[]),
            ],
            Vec::new(),
        );
        // Bo Reed appears twice, Ann Vale once: Bo is primary.
        let out = resolve_docs(
            &catalog,
            &[doc(
                "d1",
                "Bo Reed and Ann Vale",
                "Bo Reed spoke first. Then they left the stage.",
            )],
        );
        let implicit: Vec<&Mention> = out.mentions.iter().filter(|m| m.is_implicit).collect();
        assert_eq!(implicit.len(), 1);
        assert_eq!(implicit[0].entity_id, "person_b");
    }

    #[test]
    fn identical_inputs_identical_outputs() {
        let catalog = Catalog::new(
            vec![
                entry("person_p2", "Jordan One", &["Jordan"], EntityType::Person, true, &[]),
                entry("show_w", "The White Lotus", &[], EntityType::Show, true, &[]),
            ],
            Vec::new(),
        );
        let docs = vec![
            doc("d1", "Jordan was great.", ""),
            doc("d2", "The White Lotus finale", "It was divisive."),
        ];
        let a = resolve_docs(&catalog, &docs);
        let b = resolve_docs(&catalog, &docs);
        let ids = |out: &ResolveOutput| -> (Vec<String>, Vec<String>) {
            (
                out.mentions.iter().map(|m| m.mention_id.clone()).collect(),
                out.unresolved
                    .iter()
                    .map(|u| u.unresolved_id.clone())
                    .collect(),
            )
        };
        assert_eq!(ids(&a), ids(&b));
    }
}
