//! Drives a whole workflow instance through the job workers.
//!
//! The in-memory queue plays the workflow engine: each completed job merges
//! its output delta into the instance, and the next step is enqueued with the
//! instance's current variables.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use zkvm_ambassador::gateway::{GatewayCall, MockConfig, MockGateway};
use zkvm_ambassador::pipeline::{OperationDispatcher, VariableMap};
use zkvm_ambassador::proof::{self, SerializedProof};
use zkvm_ambassador::queue::{InMemoryJobQueue, JobQueue, JobWorker, WorkerOptions};

fn workers(queue: &Arc<InMemoryJobQueue>, gateway: Arc<MockGateway>) -> Vec<JobWorker> {
    let dispatcher = OperationDispatcher::new(gateway);
    dispatcher
        .job_types()
        .map(|job_type| {
            let queue: Arc<dyn JobQueue> = queue.clone();
            JobWorker::new(
                queue,
                dispatcher.clone(),
                WorkerOptions::new(job_type)
                    .with_backoff(Duration::from_millis(1), Duration::from_millis(5)),
            )
        })
        .collect()
}

fn worker_for<'a>(workers: &'a [JobWorker], job_type: &str) -> &'a JobWorker {
    workers
        .iter()
        .find(|w| w.options().job_type == job_type)
        .unwrap()
}

fn chain_len(variables: &VariableMap) -> usize {
    variables["proof_chain"].as_array().map_or(0, Vec::len)
}

#[test]
fn test_instance_prove_prove_compose_verify() {
    let queue = Arc::new(InMemoryJobQueue::new());
    let gateway = Arc::new(MockGateway::default_mock());
    let workers = workers(&queue, gateway.clone());

    let initial = match json!({"a": 2, "b": 3, "operation": "add"}) {
        Value::Object(map) => map,
        _ => unreachable!(),
    };
    let instance = queue.start_instance(initial).unwrap();

    queue.push_step(instance, "proving-job").unwrap();
    assert_eq!(worker_for(&workers, "proving-job").poll_once().unwrap(), 1);
    let after_first = queue.instance_variables(instance).unwrap();
    assert_eq!(chain_len(&after_first), 1);
    let p1 = after_first["previous_proof"].clone();

    queue
        .set_instance_variable(instance, "composition", json!(true))
        .unwrap();
    queue.set_instance_variable(instance, "operation", json!("mul")).unwrap();
    queue.push_step(instance, "proving-job").unwrap();
    worker_for(&workers, "proving-job").poll_once().unwrap();
    let after_second = queue.instance_variables(instance).unwrap();
    assert_eq!(chain_len(&after_second), 2);
    assert_eq!(after_second["proof_chain"][0], p1);

    queue.push_step(instance, "compose-job").unwrap();
    worker_for(&workers, "compose-job").poll_once().unwrap();
    let after_compose = queue.instance_variables(instance).unwrap();
    assert_eq!(chain_len(&after_compose), 3);

    queue.push_step(instance, "verify-job").unwrap();
    worker_for(&workers, "verify-job").poll_once().unwrap();
    let done = queue.instance_variables(instance).unwrap();
    assert_eq!(done["is_valid_executed"], json!(true));
    assert_eq!(chain_len(&done), 3, "verify leaves the chain alone");

    // Compose saw the two proofs in the order they were appended, and verify
    // checked the aggregate.
    let calls = gateway.calls();
    assert_eq!(calls.len(), 4);
    match (&calls[1], &calls[2], &calls[3]) {
        (GatewayCall::Prove(second), GatewayCall::Compose(compose), GatewayCall::Verify(verify)) => {
            let p1 = proof::parse(&SerializedProof::from(p1.as_str().unwrap())).unwrap();
            assert_eq!(second.previous_proof.as_ref(), Some(&p1));
            assert_eq!(compose.proof_chain.len(), 2);
            assert_eq!(compose.proof_chain[0], p1);
            assert_eq!(
                verify.proof.as_ref().map(|p| p.receipt.as_slice()),
                Some(b"mock-receipt-3".as_slice())
            );
        }
        other => panic!("unexpected calls: {other:?}"),
    }
    assert!(queue.failed().is_empty());
}

#[test]
fn test_backend_failure_fails_job_and_keeps_instance() {
    let queue = Arc::new(InMemoryJobQueue::new());
    let gateway = Arc::new(MockGateway::new(MockConfig::new("mock").prove_fails()));
    let workers = workers(&queue, gateway);

    let instance = queue
        .start_instance(match json!({"a": 1, "b": 2, "operation": "add"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        })
        .unwrap();
    queue.push_step(instance, "proving-job").unwrap();
    worker_for(&workers, "proving-job").poll_once().unwrap();

    let failed = queue.failed();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].job_type, "proving-job");
    assert!(failed[0].error_message.contains("mock prove failed"));
    let variables = queue.instance_variables(instance).unwrap();
    assert!(variables.get("proof_chain").is_none());
}

#[test]
fn test_invalid_variables_fail_job_without_backend_call() {
    let queue = Arc::new(InMemoryJobQueue::new());
    let gateway = Arc::new(MockGateway::default_mock());
    let workers = workers(&queue, gateway.clone());

    let mut variables = VariableMap::new();
    variables.insert("a".into(), json!(1));
    variables.insert("operation".into(), json!("add"));
    queue.push("proving-job", variables).unwrap();
    worker_for(&workers, "proving-job").poll_once().unwrap();

    let failed = queue.failed();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].error_message.contains("`b`"), "{}", failed[0].error_message);
    assert!(gateway.calls().is_empty());
}
