//! Answer composition (C9).
//!
//! Turns a ranked evidence list into an answer whose every claim traces
//! back to a retrieved chunk. The default path is a deterministic
//! extractive composer: no language model, no invented text. A pluggable
//! [`Refiner`] may synthesize prose instead, but its output is admitted
//! only if every citation it produces names an id actually present in
//! the evidence offered to it — otherwise the composer falls back to
//! extractive mode. This gate is what "no citation → no claim" means in
//! code, not just in the answer text.

use crate::io::unicode::{grapheme_count, truncate_graphemes};
use crate::retrieval::EvidenceHit;
use std::collections::HashSet;

/// Character budget for an extractive citation snippet, matching the
/// reference system's `MAX_CITATION_SNIPPET_CHARS`.
pub const MAX_CITATION_SNIPPET_CHARS: usize = 280;

/// Number of top passages the extractive composer includes.
const EXTRACTIVE_TOP_N: usize = 5;

/// Number of evidence spans offered to a refiner.
const MAX_REFINER_SPANS: usize = 8;

/// Sentinel answer text returned when no evidence is available.
pub const NO_EVIDENCE_ANSWER: &str = "No evidence found in the specified corpus and filters.";

/// A citation backing a claim in a composed answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Citation {
    /// Id of the chunk this citation points to.
    pub chunk_id: String,
    /// Section breadcrumb, for display.
    pub section_path: String,
    /// Inclusive page range the cited chunk spans.
    pub page_span: (u32, u32),
    /// The cited text itself.
    pub text: String,
}

/// The result of composing an answer from evidence.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedAnswer {
    /// The answer text (markdown bullets in extractive mode, refiner
    /// prose in refined mode).
    pub answer: String,
    /// Citations backing the answer, in the order they appear.
    pub citations: Vec<Citation>,
    /// Deterministic function of retrieval scores, not of refiner
    /// output: the mean normalized similarity of the top-5 evidence
    /// hits actually used.
    pub confidence: f64,
    /// True when no evidence was available to compose from.
    pub missing_evidence: bool,
    /// Which path produced this answer: `"extractive"` or `"refined"`.
    pub method: &'static str,
}

/// One piece of evidence offered to a refiner, with a short id (`e1`,
/// `e2`, ...) the refiner must cite by.
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceSpan {
    /// Short id the refiner cites.
    pub id: String,
    /// Chunk text.
    pub text: String,
    /// Section breadcrumb.
    pub section_path: String,
    /// First page the chunk spans.
    pub page: u32,
    /// Underlying chunk id.
    pub chunk_id: String,
}

/// One atomic claim a refiner makes, bound to one or more evidence ids.
#[derive(Debug, Clone, PartialEq)]
pub struct Claim {
    /// The claim's text.
    pub text: String,
    /// Evidence span ids (from [`EvidenceSpan::id`]) this claim cites.
    pub citation_ids: Vec<String>,
}

/// A refiner's raw, not-yet-validated output.
#[derive(Debug, Clone, PartialEq)]
pub struct RefinerOutput {
    /// Synthesized markdown answer.
    pub answer_markdown: String,
    /// Claims backing the answer.
    pub claims: Vec<Claim>,
    /// Whether the refiner judged the evidence insufficient.
    pub missing_evidence: bool,
}

/// An external collaborator that synthesizes prose from evidence spans
/// (e.g. a language model client). Not shipped by this crate; the
/// extractive composer is always available as the fallback.
pub trait Refiner: Send + Sync {
    /// Synthesizes an answer to `question` from `spans`.
    ///
    /// # Errors
    ///
    /// Returns an error if the refiner's backend is unreachable or
    /// returns malformed output.
    fn refine(&self, question: &str, spans: &[EvidenceSpan]) -> crate::Result<RefinerOutput>;
}

fn snippet(text: &str) -> String {
    let collapsed: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if grapheme_count(&collapsed) <= MAX_CITATION_SNIPPET_CHARS {
        return collapsed;
    }
    let truncated = truncate_graphemes(&collapsed, MAX_CITATION_SNIPPET_CHARS);
    format!("{truncated}\u{2026}")
}

/// Mean retrieval score of the top-5 hits, the confidence signal shared
/// by both composition modes.
fn mean_top_score(evidence: &[EvidenceHit]) -> f64 {
    let top = &evidence[..evidence.len().min(EXTRACTIVE_TOP_N)];
    if top.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = top.iter().map(|h| h.score).sum::<f64>() / top.len() as f64;
    mean.clamp(0.0, 1.0)
}

/// Composes a deterministic, extractive answer from `evidence`: the top
/// up to five passages as bulleted, budget-truncated snippets, cited
/// exactly by the chunks they came from.
#[must_use]
pub fn compose_extractive(evidence: &[EvidenceHit]) -> ComposedAnswer {
    if evidence.is_empty() {
        return ComposedAnswer {
            answer: NO_EVIDENCE_ANSWER.to_string(),
            citations: Vec::new(),
            confidence: 0.0,
            missing_evidence: true,
            method: "extractive",
        };
    }

    let top = &evidence[..evidence.len().min(EXTRACTIVE_TOP_N)];
    let bullets: Vec<String> = top.iter().map(|hit| format!("- {}", snippet(&hit.text))).collect();
    let citations: Vec<Citation> = top
        .iter()
        .map(|hit| Citation {
            chunk_id: hit.chunk_id.clone(),
            section_path: hit.section_path.clone(),
            page_span: (hit.page_start.unwrap_or(0), hit.page_end.unwrap_or(0)),
            text: hit.text.clone(),
        })
        .collect();

    ComposedAnswer {
        answer: format!("Here are the most relevant cited passages:\n{}", bullets.join("\n")),
        citations,
        confidence: mean_top_score(evidence),
        missing_evidence: false,
        method: "extractive",
    }
}

fn build_spans(evidence: &[EvidenceHit]) -> Vec<EvidenceSpan> {
    evidence
        .iter()
        .take(MAX_REFINER_SPANS)
        .enumerate()
        .map(|(i, hit)| EvidenceSpan {
            id: format!("e{}", i + 1),
            text: hit.text.clone(),
            section_path: hit.section_path.clone(),
            page: hit.page_start.unwrap_or(1),
            chunk_id: hit.chunk_id.clone(),
        })
        .collect()
}

/// Validates that every citation id a refiner's claims reference is a
/// member of the evidence span ids actually offered to it.
fn citations_are_valid(output: &RefinerOutput, spans: &[EvidenceSpan]) -> bool {
    let known_ids: HashSet<&str> = spans.iter().map(|s| s.id.as_str()).collect();
    output
        .claims
        .iter()
        .all(|claim| claim.citation_ids.iter().all(|id| known_ids.contains(id.as_str())))
}

fn citations_from_claims(output: &RefinerOutput, spans: &[EvidenceSpan]) -> Vec<Citation> {
    let span_by_id: std::collections::HashMap<&str, &EvidenceSpan> =
        spans.iter().map(|s| (s.id.as_str(), s)).collect();

    let mut cited_ids: Vec<&str> = Vec::new();
    let mut seen = HashSet::new();
    for claim in &output.claims {
        for id in &claim.citation_ids {
            if seen.insert(id.as_str()) {
                cited_ids.push(id.as_str());
            }
        }
    }

    cited_ids
        .into_iter()
        .filter_map(|id| span_by_id.get(id))
        .map(|span| Citation {
            chunk_id: span.chunk_id.clone(),
            section_path: span.section_path.clone(),
            page_span: (span.page, span.page),
            text: span.text.clone(),
        })
        .collect()
}

/// Composes an answer from `evidence`, attempting `refiner` first (if
/// given) and falling back to extractive composition if the refiner
/// errors or produces an invalid citation.
///
/// # Errors
///
/// Never returns an error from the refiner path: any refiner failure
/// (backend error or citation-validation failure) is absorbed and
/// treated as a signal to fall back to extractive mode.
pub fn compose(
    evidence: &[EvidenceHit],
    question: &str,
    refiner: Option<&dyn Refiner>,
) -> ComposedAnswer {
    if evidence.is_empty() {
        return compose_extractive(evidence);
    }

    let Some(refiner) = refiner else {
        return compose_extractive(evidence);
    };

    let spans = build_spans(evidence);
    match refiner.refine(question, &spans) {
        Ok(output) if citations_are_valid(&output, &spans) => ComposedAnswer {
            answer: output.answer_markdown.clone(),
            citations: citations_from_claims(&output, &spans),
            confidence: mean_top_score(evidence),
            missing_evidence: output.missing_evidence,
            method: "refined",
        },
        _ => compose_extractive(evidence),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn hit(chunk_id: &str, text: &str, score: f64) -> EvidenceHit {
        EvidenceHit {
            chunk_id: chunk_id.to_string(),
            source_id: "doc".to_string(),
            text: text.to_string(),
            section_path: "Section 1".to_string(),
            page_start: Some(1),
            page_end: Some(2),
            score,
            framework: "SOX".to_string(),
            jurisdiction: "US".to_string(),
            doc_type: "policy".to_string(),
            authority_level: "internal".to_string(),
            effective_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            version: "1".to_string(),
        }
    }

    #[test]
    fn empty_evidence_returns_sentinel() {
        let answer = compose_extractive(&[]);
        assert_eq!(answer.answer, NO_EVIDENCE_ANSWER);
        assert!(answer.citations.is_empty());
        assert!(answer.missing_evidence);
    }

    #[test]
    fn extractive_includes_at_most_five_citations() {
        let evidence: Vec<EvidenceHit> = (0..8).map(|i| hit(&format!("c{i}"), "passage text", 0.9)).collect();
        let answer = compose_extractive(&evidence);
        assert_eq!(answer.citations.len(), 5);
        assert_eq!(answer.method, "extractive");
    }

    #[test]
    fn snippet_truncates_long_text_with_ellipsis() {
        let long_text = "word ".repeat(100);
        let evidence = vec![hit("c0", &long_text, 0.9)];
        let answer = compose_extractive(&evidence);
        assert!(answer.answer.contains('\u{2026}'));
    }

    #[test]
    fn confidence_is_mean_of_top_five_scores() {
        let evidence = vec![hit("a", "x", 1.0), hit("b", "y", 0.0)];
        let answer = compose_extractive(&evidence);
        assert!((answer.confidence - 0.5).abs() < 1e-9);
    }

    struct StubRefiner {
        output: RefinerOutput,
    }

    impl Refiner for StubRefiner {
        fn refine(&self, _question: &str, _spans: &[EvidenceSpan]) -> crate::Result<RefinerOutput> {
            Ok(self.output.clone())
        }
    }

    #[test]
    fn refiner_output_with_valid_citations_is_used() {
        let evidence = vec![hit("c0", "internal control text", 0.8)];
        let refiner = StubRefiner {
            output: RefinerOutput {
                answer_markdown: "Controls must be documented.".to_string(),
                claims: vec![Claim {
                    text: "Controls must be documented.".to_string(),
                    citation_ids: vec!["e1".to_string()],
                }],
                missing_evidence: false,
            },
        };

        let answer = compose(&evidence, "what controls apply?", Some(&refiner));
        assert_eq!(answer.method, "refined");
        assert_eq!(answer.citations.len(), 1);
        assert_eq!(answer.citations[0].chunk_id, "c0");
    }

    #[test]
    fn refiner_output_with_unknown_citation_falls_back_to_extractive() {
        let evidence = vec![hit("c0", "internal control text", 0.8)];
        let refiner = StubRefiner {
            output: RefinerOutput {
                answer_markdown: "Fabricated claim.".to_string(),
                claims: vec![Claim {
                    text: "Fabricated claim.".to_string(),
                    citation_ids: vec!["e99".to_string()],
                }],
                missing_evidence: false,
            },
        };

        let answer = compose(&evidence, "what controls apply?", Some(&refiner));
        assert_eq!(answer.method, "extractive");
    }

    #[test]
    fn no_refiner_uses_extractive_directly() {
        let evidence = vec![hit("c0", "text", 0.5)];
        let answer = compose(&evidence, "question", None);
        assert_eq!(answer.method, "extractive");
    }
}
