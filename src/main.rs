use anyhow::Context;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use kairos::task::LogListener;
use kairos::{
    Component, ComponentId, DelayConfig, DelayElement, Director, ExecutionTrace, KairosResult,
    ModelTime, ScheduleRequest, SchedulerConfig, Signal, Simulation, SimulationContext, TaskConfig,
    TaskId, TaskScheduler,
};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    println!("═══════════════════════════════════════════════════════");
    println!("  Kairos: Deterministic Discrete-Event Scheduling Core");
    println!("═══════════════════════════════════════════════════════");
    println!();

    delay_demo().context("delay demo failed")?;
    println!();
    scheduler_demo().context("scheduler demo failed")?;

    println!();
    println!("  ✓ Demo complete.");
    Ok(())
}

/// Sample a triangle wave every second and delay it by 1.5 s.
fn delay_demo() -> anyhow::Result<()> {
    println!("  Delay element (delay = 1.5, initial value = 0):");

    let source = ComponentId::new(0);
    let config = DelayConfig::new(ModelTime::from_secs(1.5)).with_initial_value(0.0);
    let mut delay = DelayElement::new(ComponentId::new(1), config)?;

    let mut sim = Simulation::new().with_stop_time(ModelTime::from_secs(8.0));
    sim.initialize(&mut delay)?;
    for t in 0..=6 {
        sim.schedule_firing(source, ModelTime::from_secs(t as f64))?;
    }

    let mut rows = Vec::new();
    sim.run(&mut |ctx: &mut SimulationContext<'_>, target: ComponentId| -> KairosResult<bool> {
        let now = ctx.model_time().as_secs_f64();
        let mut sample = None;
        if target == source {
            let value = 3.0 - (now - 3.0).abs();
            sample = Some(value);
            delay.set_input(Signal::Present(value));
        }
        delay.fire(ctx)?;
        rows.push((ctx.tag(), sample, delay.output().copied()));
        delay.postfire(ctx)
    })?;

    for (tag, input, output) in rows {
        let show = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v));
        println!("    {:<16} in={:>6} out={:>6}", tag.to_string(), show(input), show(output));
    }
    Ok(())
}

/// Two periodic-ish tasks where the urgent one preempts the background one.
fn scheduler_demo() -> anyhow::Result<()> {
    println!("  Task scheduler (background prio 1, urgent prio 5):");

    let background = TaskId::new(1);
    let urgent = TaskId::new(2);
    let config = SchedulerConfig::builder()
        .task_with(TaskConfig::new(1, "background", 1).autostart())
        .task(2, "urgent", 5)
        .resource(1)
        .build()?;

    let mut sched = TaskScheduler::new(ComponentId::new(10), &config)?;
    let trace = std::rc::Rc::new(std::cell::RefCell::new(ExecutionTrace::new()));
    sched.add_listener(trace.clone());
    sched.add_listener(LogListener);

    let mut sim = Simulation::new();
    sim.initialize(&mut sched)?;
    sched
        .submit(&mut sim.context(), ScheduleRequest::execution_time(background, ModelTime::from_secs(4.0)))
        .context("background budget rejected")?;

    // An interrupt source that wakes the urgent task at t=1 and t=6.
    let irq = ComponentId::new(20);
    for t in [1.0, 6.0] {
        sim.schedule_firing(irq, ModelTime::from_secs(t))?;
    }

    sim.run(&mut |ctx: &mut SimulationContext<'_>, target: ComponentId| -> KairosResult<bool> {
        if target == irq {
            let released = sched.activate_task(ctx, urgent).and_then(|()| {
                sched.submit(ctx, ScheduleRequest::execution_time(urgent, ModelTime::from_secs(0.5)))
            });
            if let Err(e) = released {
                warn!(task = %urgent, error = %e, "urgent task not released");
            }
            return Ok(true);
        }
        sched.fire(ctx)?;
        // The urgent task terminates as soon as its segment ends.
        if sched.running() == Some(urgent) && sched.task(urgent).is_some_and(|t| t.remaining.is_infinite()) {
            if let Err(e) = sched.terminate_task(ctx, urgent) {
                warn!(task = %urgent, error = %e, "urgent task failed to terminate");
            }
        }
        sched.postfire(ctx)
    })?;

    for entry in &trace.borrow().entries {
        println!("    {}", entry);
    }
    let dispatched: Vec<String> = sched.dispatched().iter().map(|t| t.to_string()).collect();
    println!("    dispatched: {}", dispatched.join(", "));
    Ok(())
}
