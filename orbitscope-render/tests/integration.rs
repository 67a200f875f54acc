use std::sync::Arc;

use orbitscope_core::formula::{create, create_default};
use orbitscope_core::{
    Classification, EvaluationOptions, FormulaRef, FractalParameters,
    OrbitEvaluator, ScreenSize,
};
use orbitscope_render::{
    BuiltinMap, ColoringMethod, ColoringParameters, Colorizer, ComputeCancel, ControllerState,
    IterationBuffer, IteratorController, MapSettings, RenderError, ScalingMode, Scheduler,
};

fn compute(
    formula: &FormulaRef,
    screen: ScreenSize,
    options: EvaluationOptions,
    threads: usize,
    blocks: usize,
) -> IterationBuffer {
    let evaluator: OrbitEvaluator = OrbitEvaluator::new(
        Arc::clone(formula),
        formula.default_bounds(),
        screen,
        options,
    );
    let scheduler = Scheduler::new(threads, blocks).unwrap();
    let mut buffer = IterationBuffer::new(screen);
    scheduler
        .compute(&mut buffer, &evaluator, &ComputeCancel::new(), |_, _| {})
        .unwrap();
    buffer
}

#[test]
fn results_do_not_depend_on_partitioning() {
    let screen = ScreenSize::new(48, 36).unwrap();
    for family in ["Mandelbrot", "BurningShip", "NewtonSine", "Lyapunov"] {
        let formula = create_default(family).unwrap();
        let reference = compute(&formula, screen, EvaluationOptions::default(), 1, 1);
        assert!(reference.is_complete());
        for threads in [1, 2, 4] {
            for blocks in [1, 3, 17, 64] {
                let other = compute(&formula, screen, EvaluationOptions::default(), threads, blocks);
                assert_eq!(
                    reference, other,
                    "{family} differs with {threads} threads and {blocks} blocks"
                );
            }
        }
    }
}

#[test]
fn advanced_pass_is_partition_independent_too() {
    let screen = ScreenSize::new(30, 20).unwrap();
    let formula = create_default("Mandelbrot").unwrap();
    let options = EvaluationOptions {
        advanced_statistics: true,
        invert_y: false,
    };
    let a = compute(&formula, screen, options, 1, 1);
    let b = compute(&formula, screen, options, 3, 7);
    assert_eq!(a, b);
    assert!(a.cells().iter().flatten().all(|r| r.stats.is_some()));
}

#[test]
fn automatic_roots_are_indexed_densely() {
    let formula = create_default("NewtonSine").unwrap();
    let buffer = compute(&formula, ScreenSize::new(40, 30).unwrap(), EvaluationOptions::default(), 4, 9);
    let roots: Vec<u32> = buffer.cells().iter().flatten().filter_map(|r| r.root()).collect();
    assert!(!roots.is_empty());
    let max = roots.iter().copied().max().unwrap();
    for idx in 0..=max {
        assert!(roots.contains(&idx), "root index {idx} unused");
    }
    // Converged cells never keep an unresolved root.
    assert!(buffer
        .cells()
        .iter()
        .flatten()
        .all(|r| !matches!(r.classification, Classification::Converged { root: None })));
}

#[test]
fn recoloring_never_touches_iteration_data() {
    let formula = create_default("Mandelbrot").unwrap();
    let buffer = compute(&formula, ScreenSize::new(32, 24).unwrap(), EvaluationOptions::default(), 2, 4);
    let before = buffer.clone();

    let mut params = ColoringParameters::default();
    let first = Colorizer::new(&params).colorize(&buffer);
    assert_eq!(first, Colorizer::new(&params).colorize(&buffer));

    params.exterior.map = BuiltinMap::Fire;
    params.exterior.scaling = ScalingMode::Log;
    let second = Colorizer::new(&params).colorize(&buffer);
    assert_ne!(first, second);
    assert_eq!(buffer, before);
}

#[test]
fn rank_order_spreads_exterior_over_map() {
    let formula = create_default("Mandelbrot").unwrap();
    let buffer = compute(&formula, ScreenSize::new(40, 30).unwrap(), EvaluationOptions::default(), 2, 4);
    let params = ColoringParameters {
        exterior: MapSettings {
            map: BuiltinMap::Grayscale,
            method: ColoringMethod::Iterations,
            scaling: ScalingMode::RankOrder,
            continuous: true,
            ..MapSettings::default()
        },
        smooth: false,
        ..ColoringParameters::default()
    };
    let colorizer = Colorizer::new(&params);
    let plan = colorizer.prepare(&buffer);

    let mut exterior: Vec<(usize, u32)> = buffer
        .cells()
        .iter()
        .enumerate()
        .filter_map(|(i, c)| c.filter(|r| r.is_escaped()).map(|r| (i, r.iterations)))
        .collect();
    exterior.sort_by_key(|&(_, n)| n);
    let (lowest, _) = exterior[0];
    let (highest, _) = exterior[exterior.len() - 1];
    assert_eq!(plan.exterior_rank(lowest), Some(0.0));
    assert_eq!(plan.exterior_rank(highest), Some(1.0));
}

#[test]
fn controller_interrupt_is_not_a_failure() {
    let formula = create(
        "Mandelbrot",
        FractalParameters::default().with_max_iterations(100_000),
    )
    .unwrap();
    let mut controller =
        IteratorController::with_workers(formula, ScreenSize::new(200, 200).unwrap(), 1, 200)
            .unwrap();
    controller.recalc().unwrap();
    controller.interrupt();
    match controller.wait() {
        Some(Err(RenderError::Interrupted(i))) => {
            assert!(i.blocks_done < i.blocks_total);
            assert_eq!(controller.state(), ControllerState::Interrupted);
            assert!(!controller.buffer().is_complete());
            assert!(controller.image().is_some());
        }
        Some(Ok(_)) => assert_eq!(controller.state(), ControllerState::Idle),
        other => panic!("unexpected outcome: {other:?}"),
    }

    // The next request behaves like a fresh pass.
    controller
        .set_parameters(FractalParameters::default().with_max_iterations(64))
        .unwrap();
    controller.recalc().unwrap();
    assert!(controller.wait().unwrap().is_ok());
    assert_eq!(controller.state(), ControllerState::Idle);
    assert!(controller.buffer().is_complete());
}
