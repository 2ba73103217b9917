use anyhow::Result;

use deimos::prelude::*;

mod framework;

use framework::DeclaredTask;

fn empty_task(name: &str) -> Box<DeclaredTask> {
    Box::new(DeclaredTask::new(name, vec![]))
}

#[test]
pub fn dependencies_form_a_dag() -> Result<()> {
    let mut pipeline = Pipeline::new();
    let a = pipeline.add_task(empty_task("a"));
    let b = pipeline.add_task(empty_task("b"));
    let c = pipeline.add_task(empty_task("c"));
    pipeline.add_dependency(a, b)?;
    pipeline.add_dependency(b, c)?;
    pipeline.add_dependency(a, c)?;
    pipeline.validate()?;
    assert_eq!(pipeline.task_count(), 3);
    Ok(())
}

#[test]
pub fn cycle_is_rejected() -> Result<()> {
    let mut pipeline = Pipeline::new();
    let a = pipeline.add_task(empty_task("a"));
    let b = pipeline.add_task(empty_task("b"));
    pipeline.add_dependency(a, b)?;
    let result = pipeline.add_dependency(b, a);
    assert!(matches!(
        result.unwrap_err().downcast_ref::<Error>(),
        Some(Error::GraphHasCycle)
    ));
    // The failed edge must not have been kept.
    pipeline.validate()?;
    Ok(())
}

#[test]
pub fn self_dependency_is_rejected() {
    let mut pipeline = Pipeline::new();
    let a = pipeline.add_task(empty_task("a"));
    let result = pipeline.add_dependency(a, a);
    assert!(matches!(
        result.unwrap_err().downcast_ref::<Error>(),
        Some(Error::GraphHasCycle)
    ));
}

#[test]
pub fn dangling_edge_is_rejected() {
    let mut other = Pipeline::new();
    other.add_task(empty_task("x"));
    other.add_task(empty_task("y"));
    let foreign = other.add_task(empty_task("z"));

    let mut pipeline = Pipeline::new();
    let a = pipeline.add_task(empty_task("a"));
    let result = pipeline.add_dependency(a, foreign);
    assert!(matches!(
        result.unwrap_err().downcast_ref::<Error>(),
        Some(Error::DanglingEdge)
    ));
}

#[test]
pub fn dot_output_names_tasks() -> Result<()> {
    let mut pipeline = Pipeline::new();
    let shadows = pipeline.add_task(empty_task("shadows"));
    let lighting = pipeline.add_task(empty_task("lighting"));
    pipeline.add_dependency(shadows, lighting)?;
    let dot = pipeline.dot();
    assert!(dot.contains("shadows"));
    assert!(dot.contains("lighting"));
    Ok(())
}

#[test]
pub fn task_names_are_queryable() {
    let mut pipeline = Pipeline::new();
    let a = pipeline.add_task(empty_task("gbuffer"));
    assert_eq!(pipeline.task_name(a).as_deref(), Some("gbuffer"));
}
