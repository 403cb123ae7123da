//! Integration test: the reference scene's collaborators agree with each
//! other.
//!
//! Every placement proposed by the ring reachability model puts the grasp
//! target within the arm's reach, so IK without environment checking must
//! succeed for all of them, and every IK solution must actually reach the
//! grasp target.

use basegrasp_core::config::DistributionOptions;
use basegrasp_core::traits::{GraspModel, GraspTargets, Manipulator, ReachabilityModel, Robot};
use basegrasp_core::types::{GraspId, GraspTarget, JointState, PairId};
use basegrasp_kinematics::{MobileArm, SceneConfig, TabletopScene};

fn first_grasp_target(scene: &TabletopScene) -> GraspTarget {
    let catalog = &scene.catalogs[0];
    GraspTarget {
        transform: catalog.global_grasp_transform(&catalog.grasps()[0], true),
        grasp: GraspId::new(PairId(0), 0),
    }
}

fn single(target: &GraspTarget) -> GraspTargets<'static> {
    Box::new(std::iter::once(target.clone()))
}

#[test]
fn ordered_placements_are_kinematically_reachable() {
    let scene = TabletopScene::build(&SceneConfig::default()).unwrap();
    let target = first_grasp_target(&scene);
    let options = DistributionOptions::default();
    let mut robot = scene.robot.clone();

    let placements: Vec<_> = scene.reachability.sample_base_iter(single(&target), &options).collect();
    assert_eq!(placements.len(), scene.reachability.params().per_target());

    for placement in &placements {
        robot.set_transform(&placement.pose);
        let q = Manipulator::<MobileArm>::find_ik_solution(&scene.manipulator, &robot, &target.transform, false)
            .unwrap()
            .unwrap_or_else(|| panic!("no IK solution from {:?}", placement.pose.translation));

        let reached = robot.transform() * scene.manipulator.chain().forward_kinematics(&q).unwrap();
        let miss = (reached.translation.vector - target.transform.translation.vector).norm();
        assert!(miss < 1e-3, "missed the grasp target by {miss}");
    }
}

#[test]
fn environment_checked_solutions_are_collision_free() {
    let scene = TabletopScene::build(&SceneConfig::default()).unwrap();
    let options = DistributionOptions::default();
    let mut robot = scene.robot.clone();
    let mut solved = 0;

    for (index, grasp) in scene.catalogs[1].grasps().iter().enumerate() {
        let target = GraspTarget {
            transform: scene.catalogs[1].global_grasp_transform(grasp, true),
            grasp: GraspId::new(PairId(1), index),
        };
        for placement in scene.reachability.random_base_iter(single(&target), &options) {
            robot.set_transform(&placement.pose);
            let arm = Manipulator::<MobileArm>::arm_joints(&scene.manipulator).to_vec();
            let Some(q) =
                Manipulator::<MobileArm>::find_ik_solution(&scene.manipulator, &robot, &target.transform, true)
                    .unwrap()
            else {
                continue;
            };
            robot.set_joint_values(&JointState::partial(q, arm)).unwrap();
            if !scene.manipulator.base_collides(&placement.pose) {
                assert!(!scene.manipulator.in_collision(&robot).unwrap());
            }
            solved += 1;
        }
    }
    assert!(solved > 0);
}
