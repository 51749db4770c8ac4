//! Property tests over arbitrary provider failure patterns.

mod common;

use std::sync::Arc;

use common::{FakeProviders, orchestrator};
use contentflow_providers::ProviderError;
use contentflow_utils::types::{RunStatus, StageId};
use proptest::prelude::*;

fn failure_strategy() -> impl Strategy<Value = Option<ProviderError>> {
    prop_oneof![
        3 => Just(None),
        1 => Just(Some(ProviderError::Outage("down".to_string()))),
        1 => Just(Some(ProviderError::Quota("exhausted".to_string()))),
        1 => Just(Some(ProviderError::RateLimited("slow down".to_string()))),
        1 => Just(Some(ProviderError::Auth("expired".to_string()))),
        1 => Just(Some(ProviderError::InvalidResponse("garbled".to_string()))),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_artifacts_follow_stage_order(
        failures in proptest::collection::vec(failure_strategy(), 5)
    ) {
        let mut fakes = FakeProviders::new();
        for (stage, failure) in StageId::ALL.iter().zip(&failures) {
            if let Some(error) = failure {
                fakes = fakes.fail(*stage, error.clone());
            }
        }
        let fakes = Arc::new(fakes);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let record = runtime.block_on(async {
            let (_store, orchestrator) = orchestrator(&fakes);
            orchestrator.execute_run(None).await.unwrap()
        });

        let first_critical_failure = StageId::ALL
            .iter()
            .zip(&failures)
            .find(|(stage, failure)| stage.is_critical() && failure.is_some())
            .map(|(stage, _)| *stage);

        // Every stage before the stopping point ran; nothing after it did.
        let expected: Vec<StageId> = StageId::ALL
            .iter()
            .zip(&failures)
            .take_while(|(stage, _)| Some(**stage) != first_critical_failure)
            .filter(|(_, failure)| failure.is_none())
            .map(|(stage, _)| *stage)
            .collect();
        prop_assert_eq!(record.stage_results.produced(), expected);

        match first_critical_failure {
            Some(stage) => {
                prop_assert_eq!(record.status, RunStatus::Failed);
                prop_assert_eq!(record.current_stage, Some(stage));
                let error = record.error.as_ref().unwrap();
                prop_assert_eq!(error.stage, Some(stage));
            }
            None => {
                prop_assert_eq!(record.status, RunStatus::Completed);
                prop_assert!(record.error.is_none());
                prop_assert_eq!(record.current_stage, None);
            }
        }

        let metadata_failed = failures[StageId::Metadata.index()].is_some();
        let metadata_reached = first_critical_failure != Some(StageId::Text);
        prop_assert_eq!(
            record.non_fatal_errors.len(),
            usize::from(metadata_failed && metadata_reached)
        );
    }
}
