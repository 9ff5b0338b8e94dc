use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use ledgerlens_audit::prelude::*;
use ledgerlens_extraction::prelude::*;

fn invoice(total_minor: i64) -> Invoice {
    Invoice {
        invoice_number: Some("INV-2026-001".to_string()),
        issue_date: chrono::NaiveDate::from_ymd_opt(2026, 1, 15),
        subtotal: Some(Money::from_minor(10_000)),
        vat_amount: Some(Money::from_minor(2_100)),
        total_amount: Some(Money::from_minor(total_minor)),
        line_items: vec![InvoiceLine {
            description: Some("Consulting".to_string()),
            quantity: Some(1.0),
            unit_price: Some(Money::from_minor(10_000)),
            net_amount: Some(Money::from_minor(10_000)),
            vat_rate: Some(21.0),
        }],
        ..Invoice::default()
    }
}

fn correct() -> Invoice {
    invoice(12_100)
}

fn misread() -> Invoice {
    invoice(12_010)
}

fn audit(doc: &Invoice) -> AuditReport {
    doc.audit(&AuditContext::belgium())
}

#[tokio::test]
async fn corrected_on_second_attempt() {
    let prompts = Mutex::new(Vec::new());
    let retry = FeedbackRetryLoop::new(RetryConfig::default()).unwrap();
    let initial = misread();
    let report = audit(&initial);

    let run = retry
        .run(initial, report, audit, |prompt| {
            let mut seen = prompts.lock().unwrap();
            seen.push(prompt);
            let answer = if seen.len() == 1 { misread() } else { correct() };
            async move { Ok::<_, String>(answer) }
        })
        .await;

    match &run.result {
        RetryResult::CorrectedOnRetry {
            data,
            attempt,
            corrected_fields,
            original_failures,
        } => {
            assert_eq!(*attempt, 2);
            assert_eq!(data.total_amount, Some(Money::from_minor(12_100)));
            assert_eq!(corrected_fields, &BTreeSet::from(["total_amount".to_string()]));
            assert_eq!(original_failures.len(), 1);
            assert_eq!(original_failures[0].check_type, CheckType::MathTotals);
        }
        other => panic!("expected CorrectedOnRetry, got {other:?}"),
    }
    assert!(run.final_report.is_passed());

    let prompts = prompts.into_inner().unwrap();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].starts_with("Attempt 1/2"));
    assert!(prompts[1].starts_with("Attempt 2/2"));
    assert!(prompts[0].contains("total_amount"));
    assert_eq!(run.metrics.total_attempts, 2);
    assert_eq!(run.metrics.failed_calls, 0);
}

#[tokio::test]
async fn still_failing_after_budget() {
    let calls = AtomicUsize::new(0);
    let retry = FeedbackRetryLoop::new(RetryConfig::default()).unwrap();
    let initial = misread();
    let report = audit(&initial);

    let run = retry
        .run(initial, report, audit, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, String>(misread()) }
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    match &run.result {
        RetryResult::StillFailing {
            attempts,
            remaining_failures,
            data,
        } => {
            assert_eq!(*attempts, 2);
            assert_eq!(remaining_failures.len(), 1);
            assert_eq!(remaining_failures[0].field, "total_amount");
            assert_eq!(data, &misread());
        }
        other => panic!("expected StillFailing, got {other:?}"),
    }
    assert!(!run.final_report.is_passed());
}

#[tokio::test]
async fn passing_extraction_makes_no_calls() {
    let calls = AtomicUsize::new(0);
    let retry = FeedbackRetryLoop::default();
    let initial = correct();
    let report = audit(&initial);

    let run = retry
        .run(initial, report, audit, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<Invoice, _>("must not be called") }
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(matches!(run.result, RetryResult::NoRetryNeeded { .. }));
    assert_eq!(run.metrics.total_attempts, 0);
    assert!(run.metrics.history.is_empty());
}

#[tokio::test]
async fn warnings_only_retry_when_enabled() {
    let without_lines = Invoice {
        line_items: Vec::new(),
        ..correct()
    };
    let report = audit(&without_lines);
    assert!(report.is_passed());
    assert_eq!(report.warning_count, 1);

    let calls = AtomicUsize::new(0);
    let lenient = FeedbackRetryLoop::new(RetryConfig::default()).unwrap();
    let run = lenient
        .run(without_lines.clone(), report.clone(), audit, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, String>(correct()) }
        })
        .await;
    assert!(matches!(run.result, RetryResult::NoRetryNeeded { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let strict = FeedbackRetryLoop::new(RetryConfig::default().with_retry_on_warnings(true)).unwrap();
    let run = strict
        .run(without_lines, report, audit, |prompt| {
            calls.fetch_add(1, Ordering::SeqCst);
            assert!(prompt.contains("[line_items] line_items"));
            async { Ok::<_, String>(correct()) }
        })
        .await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    match run.result {
        RetryResult::CorrectedOnRetry {
            attempt,
            corrected_fields,
            ..
        } => {
            assert_eq!(attempt, 1);
            assert_eq!(corrected_fields, BTreeSet::from(["line_items".to_string()]));
        }
        other => panic!("expected CorrectedOnRetry, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_call_keeps_previous_state() {
    let prompts = Mutex::new(Vec::new());
    let retry = FeedbackRetryLoop::default();
    let initial = misread();
    let report = audit(&initial);

    let run = retry
        .run(initial, report, audit, |prompt| {
            let mut seen = prompts.lock().unwrap();
            seen.push(prompt);
            let answer = if seen.len() == 1 {
                Err("vision process exited with status 1".to_string())
            } else {
                Ok(correct())
            };
            async move { answer }
        })
        .await;

    assert!(matches!(run.result, RetryResult::CorrectedOnRetry { attempt: 2, .. }));
    assert_eq!(run.metrics.failed_calls, 1);
    assert!(matches!(
        &run.metrics.history[0].outcome,
        AttemptOutcome::CallFailed { reason } if reason.contains("status 1")
    ));

    // same report fed back, only the counter moves
    let prompts = prompts.into_inner().unwrap();
    assert_eq!(
        prompts[0].replacen("Attempt 1/2", "", 1),
        prompts[1].replacen("Attempt 2/2", "", 1)
    );
}

#[tokio::test(start_paused = true)]
async fn timed_out_call_counts_as_failed() {
    let calls = AtomicUsize::new(0);
    let retry = FeedbackRetryLoop::new(
        RetryConfig::default().with_call_timeout(Duration::from_secs(5)),
    )
    .unwrap();
    let initial = misread();
    let report = audit(&initial);

    let run = retry
        .run(initial, report, audit, |_| {
            let first = calls.fetch_add(1, Ordering::SeqCst) == 0;
            async move {
                if first {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                Ok::<_, String>(correct())
            }
        })
        .await;

    assert!(matches!(run.result, RetryResult::CorrectedOnRetry { attempt: 2, .. }));
    assert_eq!(run.metrics.failed_calls, 1);
    assert_eq!(
        run.metrics.history[0].outcome,
        AttemptOutcome::TimedOut {
            limit: Duration::from_secs(5)
        }
    );
}

#[tokio::test]
async fn results_round_trip_through_json() {
    let retry = FeedbackRetryLoop::default();
    let initial = misread();
    let report = audit(&initial);
    let run = retry
        .run(initial, report, audit, |_| async { Ok::<_, String>(correct()) })
        .await;

    let json = serde_json::to_string(&run.result).unwrap();
    assert!(json.contains("\"outcome\":\"corrected_on_retry\""));
    let back: RetryResult<Invoice> = serde_json::from_str(&json).unwrap();
    assert_eq!(back, run.result);

    let metrics: RetryMetrics = serde_json::from_str(&serde_json::to_string(&run.metrics).unwrap()).unwrap();
    assert_eq!(metrics, run.metrics);
}

/// Replays canned model answers and records the feedback it was given.
struct Scripted {
    answers: Mutex<VecDeque<&'static str>>,
    feedback: Mutex<Vec<Option<String>>>,
    parser: StructuredParser<Invoice>,
}

impl Scripted {
    fn new(answers: &[&'static str]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().copied().collect()),
            feedback: Mutex::new(Vec::new()),
            parser: StructuredParser::new().unwrap(),
        }
    }
}

#[async_trait]
impl DocumentExtractor<Invoice> for Scripted {
    async fn extract(&self, request: ExtractionRequest) -> Result<Invoice, ExtractionError> {
        self.feedback.lock().unwrap().push(request.feedback);
        let answer = self
            .answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ExtractionError::Extractor("no more answers".to_string()))?;
        self.parser.parse(answer)
    }
}

const MISREAD: &str = r#"```json
{"invoice_number": "2026/0042", "issue_date": "15/01/2026", "confidence": 0.93,
 "subtotal": "1.000,00", "vat_amount": "210,00", "total_amount": "1.201,00",
 "line_items": [{"description": "Audit", "quantity": 1, "unit_price": "1.000,00", "net_amount": "1.000,00"}]}
```"#;

const CORRECTED: &str = r#"Re-checked the totals block.
{"invoice_number": "2026/0042", "issue_date": "15/01/2026", "confidence": 0.93,
 "subtotal": "1.000,00", "vat_amount": "210,00", "total_amount": "1.210,00",
 "line_items": [{"description": "Audit", "quantity": 1, "unit_price": "1.000,00", "net_amount": "1.000,00"}]}"#;

#[tokio::test]
async fn pipeline_corrects_and_auto_confirms() {
    let pipeline = DocumentPipeline::new(Scripted::new(&[MISREAD, CORRECTED]), AuditContext::belgium());
    let outcome = pipeline
        .process::<Invoice>(&["page-1.png".into()], 0.97)
        .await
        .unwrap();

    assert_eq!(outcome.document.total_amount, Some(Money::from_minor(121_000)));
    assert!(matches!(outcome.retry, RetrySummary::CorrectedOnRetry { attempt: 1, .. }));
    assert!(outcome.report.is_passed());
    assert_eq!(outcome.decision, ReviewDecision::AutoConfirmEligible);
}

#[tokio::test]
async fn pipeline_passes_feedback_to_extractor() {
    let extractor = Scripted::new(&[MISREAD, "not json at all", CORRECTED]);
    let pipeline = DocumentPipeline::new(extractor, AuditContext::belgium())
        .with_retry_config(RetryConfig::default().with_max_retries(3))
        .unwrap();
    let outcome = pipeline.process::<Invoice>(&[], 0.97).await.unwrap();

    assert!(matches!(outcome.retry, RetrySummary::CorrectedOnRetry { attempt: 2, .. }));
    assert_eq!(outcome.metrics.failed_calls, 1);
    assert!(matches!(
        &outcome.metrics.history[0].outcome,
        AttemptOutcome::CallFailed { reason } if reason.contains("JSON parsing failed")
    ));

    let feedback = pipeline_feedback(&pipeline);
    assert_eq!(feedback.len(), 3);
    assert!(feedback[0].is_none());
    assert!(feedback[1].as_deref().is_some_and(|f| f.starts_with("Attempt 1/3")));
    assert!(feedback[2].as_deref().is_some_and(|f| f.starts_with("Attempt 2/3")));
}

fn pipeline_feedback(pipeline: &DocumentPipeline<Scripted>) -> Vec<Option<String>> {
    pipeline.extractor().feedback.lock().unwrap().clone()
}

#[tokio::test]
async fn pipeline_still_failing_goes_to_review() {
    let pipeline = DocumentPipeline::new(Scripted::new(&[MISREAD, MISREAD, MISREAD]), AuditContext::belgium());
    let outcome = pipeline.process::<Invoice>(&[], 0.97).await.unwrap();

    assert!(matches!(outcome.retry, RetrySummary::StillFailing { attempts: 2, .. }));
    assert_eq!(
        outcome.decision,
        ReviewDecision::ManualReviewRequired {
            reasons: vec![ReviewReason::AuditFailed { failed_count: 1 }]
        }
    );
}

#[tokio::test]
async fn initial_extraction_failure_is_fatal() {
    let pipeline = DocumentPipeline::new(Scripted::new(&[]), AuditContext::belgium());
    let err = pipeline.process::<Invoice>(&[], 0.97).await.unwrap_err();
    assert!(matches!(err, ExtractionError::Extractor(_)));
}
