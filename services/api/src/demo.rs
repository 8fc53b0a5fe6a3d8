use crate::infra::{build_engine, parse_score, read_json};
use candidate_eval::config::{AppConfig, EngineSettings};
use candidate_eval::error::AppError;
use candidate_eval::evaluation::{
    Candidate, Decision, EvaluationContext, EvaluationId, Ranking, StatisticsSnapshot,
    TracingAuditSink,
};
use candidate_eval::telemetry;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct EvaluateArgs {
    /// JSON file holding one candidate
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Baseline performance the candidate is compared against
    #[arg(long, value_parser = parse_score)]
    pub(crate) current_performance: Option<f64>,
    /// Evaluation id to lock on (generated when omitted)
    #[arg(long)]
    pub(crate) evaluation_id: Option<String>,
}

#[derive(Args, Debug)]
pub(crate) struct RankArgs {
    /// JSON file holding an array of candidates
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Baseline performance the candidates are compared against
    #[arg(long, value_parser = parse_score)]
    pub(crate) current_performance: Option<f64>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Baseline performance for the synthetic candidates
    #[arg(long, value_parser = parse_score)]
    pub(crate) current_performance: Option<f64>,
    /// Print the reasoning trail for every decision
    #[arg(long)]
    pub(crate) show_reasoning: bool,
}

pub(crate) fn run_evaluate(args: EvaluateArgs) -> Result<(), AppError> {
    let EvaluateArgs {
        input,
        current_performance,
        evaluation_id,
    } = args;

    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let candidate: Candidate = read_json(&input)?;
    let engine = build_engine(Arc::new(TracingAuditSink), &config.engine)?;
    let context = EvaluationContext {
        evaluation_id: evaluation_id.map(EvaluationId),
        ..EvaluationContext::default()
    };

    let decision = engine.evaluate(&candidate, current_performance, &context);
    println!("{}", serde_json::to_string_pretty(&decision)?);
    Ok(())
}

pub(crate) fn run_rank(args: RankArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let candidates: Vec<Candidate> = read_json(&args.input)?;
    let engine = build_engine(Arc::new(TracingAuditSink), &config.engine)?;

    let ranking = engine.rank(&candidates, args.current_performance);
    render_ranking(&ranking);
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        current_performance,
        show_reasoning,
    } = args;

    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let engine = build_engine(Arc::new(TracingAuditSink), &EngineSettings::default())?;
    let candidates = demo_candidates();

    println!("Candidate evaluation demo");
    if let Some(baseline) = current_performance {
        println!("Baseline performance: {baseline:.2}");
    }

    println!("\nDecisions");
    for candidate in &candidates {
        let decision = engine.evaluate(candidate, current_performance, &EvaluationContext::default());
        render_decision(&decision, show_reasoning);
    }

    println!("\nRanking");
    render_ranking(&engine.rank(&candidates, current_performance));

    println!("\nStatistics");
    render_statistics(&engine.statistics());

    let eureka = engine.eureka_ids();
    if eureka.is_empty() {
        println!("\nEureka candidates: none");
    } else {
        println!("\nEureka candidates: {}", eureka.join(", "));
    }
    Ok(())
}

fn demo_candidates() -> Vec<Candidate> {
    vec![
        Candidate::new("spark-7", "fusion")
            .with_performance("expected_performance", 1.0)
            .with_performance("priority", 1.0)
            .with_novelty("novelty", 1.0)
            .with_novelty("complexity", 1.0)
            .with_confidence_hint(1.0),
        Candidate::new("hunch-2", "intuition")
            .with_performance("expected_performance", 0.85)
            .with_performance("priority", 0.8)
            .with_novelty("novelty", 0.7)
            .with_confidence_hint(0.7),
        Candidate::new("grid-4", "analytical")
            .with_performance("expected_performance", 0.9)
            .with_performance("priority", 1.0)
            .with_novelty("novelty", 0.6)
            .with_confidence_hint(0.9),
        Candidate::new("trend-1", "predictive")
            .with_performance("expected_performance", 0.5)
            .with_novelty("novelty", 0.4),
        Candidate::new("noise-9", "swarm")
            .with_performance("expected_performance", 0.05)
            .with_performance("priority", 0.1)
            .with_novelty("novelty", 0.1)
            .with_confidence_hint(0.1),
        // Non-finite indicator sends this one through the fallback scorer.
        Candidate::new("glitch-3", "fusion")
            .with_performance("expected_performance", f64::NAN)
            .with_performance("latency_gain", 0.6)
            .with_novelty("novelty", 0.5),
    ]
}

fn render_decision(decision: &Decision, show_reasoning: bool) {
    println!(
        "- {} [{:?}, {}]",
        decision.summary(),
        decision.evaluation_type,
        decision.evaluation_id
    );
    if decision.is_fallback() {
        println!("    scored by fallback evaluator");
    }
    if show_reasoning {
        for line in &decision.reasoning {
            println!("    {line}");
        }
    }
}

fn render_ranking(ranking: &Ranking) {
    for entry in &ranking.ranked {
        println!(
            "{:>3}. {:<12} combined {:.3}  novelty {:.3}  {}{}",
            entry.rank,
            entry.candidate_id,
            entry.scores.combined,
            entry.scores.novelty,
            entry.result.label(),
            if entry.eureka_detected { " *" } else { "" }
        );
    }
    for skipped in &ranking.unscored {
        println!("  -  {:<12} unscored: {}", skipped.candidate_id, skipped.reason);
    }
}

fn render_statistics(stats: &StatisticsSnapshot) {
    println!("Total evaluations: {}", stats.total_evaluations);
    println!(
        "Rates: adopt {:.0}%, reject {:.0}%, eureka {:.0}%, further test {:.0}%",
        stats.adoption_rate * 100.0,
        stats.rejection_rate * 100.0,
        stats.eureka_rate * 100.0,
        stats.further_test_rate * 100.0
    );
    println!(
        "Average confidence {:.2}, average combined score {:.3}",
        stats.average_confidence, stats.average_combined_score
    );
    println!(
        "Ledger size {} (expired {}, evicted {}), fallbacks {}",
        stats.ledger_size, stats.expired_count, stats.evicted_count, stats.fallback_count
    );
    for (kind, activity) in &stats.activity {
        println!(
            "  {kind}: {} in flight, {} scoring errors",
            activity.in_flight, activity.errors
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candidate_eval::evaluation::{DecisionOrigin, DecisionResult};

    #[test]
    fn demo_candidates_cover_every_outcome() {
        let engine = build_engine(Arc::new(TracingAuditSink), &EngineSettings::default())
            .expect("engine builds");

        let decisions: Vec<_> = demo_candidates()
            .iter()
            .map(|candidate| engine.evaluate(candidate, None, &EvaluationContext::default()))
            .collect();

        for expected in [
            DecisionResult::EurekaPromote,
            DecisionResult::Adopt,
            DecisionResult::FurtherTest,
            DecisionResult::Reject,
        ] {
            assert!(
                decisions.iter().any(|decision| decision.result == expected),
                "no {expected:?} in demo set"
            );
        }
        assert!(decisions
            .iter()
            .any(|decision| decision.origin == DecisionOrigin::Fallback));
    }

    #[test]
    fn demo_command_installs_the_subscriber() {
        run_demo(DemoArgs::default()).expect("demo runs");

        assert!(tracing::dispatcher::has_been_set());
    }
}
