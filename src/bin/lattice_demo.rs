// Lattice planning demo
//
// Scatters random obstacles, searches the 8 heading point turn lattice with a
// small A*, then materializes and re-checks the plan and plots it.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use xytheta_lattice::common::{ActionId, DiscretePose, LatticeResult, LatticeSearchSpace, StateId, Visualizable};
use xytheta_lattice::path_planning::lattice::{to_continuous, Environment, Footprint, Plan, RotatedRectangle};
use xytheta_lattice::utils::{colors, PathStyle, Visualizer};

const RESOLUTION_MM: f32 = 10.0;
const NUM_OBSTACLES: usize = 12;
const MAX_EXPANSIONS: usize = 200_000;
const SEED: u64 = 7;

fn random_obstacles(rng: &mut StdRng, start: DiscretePose, goal: DiscretePose) -> Vec<RotatedRectangle> {
    let keep_clear = |rect: &RotatedRectangle| {
        [start, goal].iter().all(|pose| {
            let x = f32::from(pose.x) * RESOLUTION_MM;
            let y = f32::from(pose.y) * RESOLUTION_MM;
            rect.distance_to(x, y) > 3.0 * RESOLUTION_MM
        })
    };

    let mut obstacles = Vec::with_capacity(NUM_OBSTACLES);
    while obstacles.len() < NUM_OBSTACLES {
        let rect = RotatedRectangle::new(
            rng.gen_range(40.0..360.0),
            rng.gen_range(-150.0..150.0),
            rng.gen_range(10.0..60.0),
            rng.gen_range(10.0..40.0),
            rng.gen_range(-std::f32::consts::PI..std::f32::consts::PI),
        );
        if keep_clear(&rect) {
            obstacles.push(rect);
        }
    }
    obstacles
}

/// A* over any lattice; returns the actions from `start` to the first state
/// matching `goal`
fn a_star<S: LatticeSearchSpace>(
    space: &S,
    start: DiscretePose,
    goal: DiscretePose,
    heuristic: impl Fn(DiscretePose) -> f32,
) -> LatticeResult<Option<Vec<ActionId>>> {
    let start_id = space.state_id(start)?;
    let mut open = BinaryHeap::new();
    let mut g_score: HashMap<StateId, f32> = HashMap::new();
    let mut parent: HashMap<StateId, (StateId, ActionId)> = HashMap::new();
    let mut closed = HashSet::new();
    let mut counter = 0u64;

    g_score.insert(start_id, 0.0);
    open.push((Reverse(OrderedFloat(heuristic(start))), counter, start_id));

    while let Some((_, _, id)) = open.pop() {
        if !closed.insert(id) {
            continue;
        }
        if closed.len() > MAX_EXPANSIONS {
            warn!("Giving up after {} expansions", MAX_EXPANSIONS);
            return Ok(None);
        }

        let pose = space.state(id);
        if pose.x == goal.x && pose.y == goal.y {
            let mut actions = Vec::new();
            let mut curr = id;
            while let Some(&(prev, action)) = parent.get(&curr) {
                actions.push(action);
                curr = prev;
            }
            actions.reverse();
            info!("Found plan with {} actions after {} expansions", actions.len(), closed.len());
            return Ok(Some(actions));
        }

        let g = g_score.get(&id).copied().unwrap_or(f32::INFINITY);
        for successor in space.successors(id, g) {
            if closed.contains(&successor.state_id) {
                continue;
            }
            if g_score.get(&successor.state_id).map_or(true, |&old| successor.g < old) {
                g_score.insert(successor.state_id, successor.g);
                parent.insert(successor.state_id, (id, successor.action_id));
                let f = successor.g + heuristic(space.state(successor.state_id));
                counter += 1;
                open.push((Reverse(OrderedFloat(f)), counter, successor.state_id));
            }
        }
    }
    Ok(None)
}

fn main() -> LatticeResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let start = DiscretePose::new(0, 0, 0);
    let goal = DiscretePose::new(40, 0, 0);

    let mut rng = StdRng::seed_from_u64(SEED);
    let base = Environment::point_turn(RESOLUTION_MM, 8, Footprint::Circle { radius_mm: 4.0 })?;
    let env = base.with_obstacles(random_obstacles(&mut rng, start, goal))?;
    info!("Environment with {} obstacles", env.num_obstacles());

    let max_velocity = env.library().robot_params().max_velocity_mmps;
    let goal_c = to_continuous(goal, env.discretization());
    let heuristic = |pose: DiscretePose| to_continuous(pose, env.discretization()).distance(&goal_c) / max_velocity;

    let Some(actions) = a_star(&env, start, goal, heuristic)? else {
        warn!("No plan found");
        return Ok(());
    };

    let plan = Plan::with_actions(start, actions);
    env.log_plan(&plan);

    let check = env.check_plan(&plan, 0, 100.0);
    info!(
        "Plan safe: {}, first {} actions within follow distance, last safe pose {}",
        check.safe,
        check.valid_plan.len(),
        check.last_safe_pose
    );

    let path = env.to_continuous_path(&plan)?;
    let executable = env.to_executable_path(&plan)?;
    info!(
        "Executable path: {} segments, {:.1}mm, final state {}",
        executable.len(),
        executable.length_mm(),
        env.plan_final_state(&plan)?
    );

    let mut vis = Visualizer::new();
    vis.set_title("xytheta lattice plan");
    env.visualize(&mut vis);
    // start is the origin
    vis.plot_primitives(
        env.library().primitives_from(start.theta),
        &PathStyle::new(colors::PRIMITIVE, "Primitives"),
    );
    vis.plot_segments(executable.path_segments(), &PathStyle::new(colors::SEGMENT, "Segments"));
    vis.plot_poses(&path, &PathStyle::new(colors::PATH, "Samples").with_line_width(1.0));
    if let (Some(&first), Some(&last)) = (path.first(), path.last()) {
        vis.plot_start(first);
        vis.plot_goal(last);
    }
    if let Err(e) = vis.save_svg("lattice_demo.svg") {
        warn!("Could not save plot: {}", e);
    }

    Ok(())
}
