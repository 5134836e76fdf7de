//! Scene assembly: configuration, palette, and the startup system that
//! spawns the tree, the dust cloud, the camera and the lights.
//!
//! Every population is one parent entity holding its [`MorphPopulation`] and
//! [`InstanceBuffer`], with one child per element sharing a mesh and a
//! material.  Bevy batches identical mesh/material pairs into instanced
//! draws, so the per-element children are cheap to render.

use bevy::pbr::{DistanceFog, FogFalloff};
use bevy::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::camera::{CameraAimConfig, OrbitCamera};
use crate::dust::{DustCloud, DustConfig};
use crate::foliage::{FoliageConfig, FoliageGenerator};
use crate::gesture::GestureConfig;
use crate::layout::{LayoutGenerator, OrnamentKind, PopulationTag};
use crate::morph::MorphConfig;
use crate::ornaments::{OrnamentConfig, OrnamentGenerator};
use crate::sensor::SensorConfig;
use crate::transform::{
    FrameTick, InstanceBuffer, InstanceOf, MorphPopulation, MotionProfile, Topper, TopperConfig,
    TreeRoot, element_transform, topper_transform,
};

/// Every tunable of the scene in one document.
///
/// Missing fields fall back to the defaults, so a partial JSON document is
/// a valid configuration.
#[derive(Resource, Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Layout RNG seed.  `None` draws a fresh seed from the OS.
    pub seed: Option<u64>,
    pub foliage: FoliageConfig,
    pub ornaments: OrnamentConfig,
    pub foliage_motion: MotionProfile,
    pub ornament_motion: MotionProfile,
    pub pearl_motion: MotionProfile,
    pub topper: TopperConfig,
    pub dust: DustConfig,
    pub morph: MorphConfig,
    pub gesture: GestureConfig,
    pub camera: CameraAimConfig,
    pub orbit: OrbitCamera,
    pub sensor: SensorConfig,
    /// Height of the tree group.
    pub root_y: f32,
    /// Yaw of the tree group (rad/s).
    pub root_spin: f32,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            seed: None,
            foliage: FoliageConfig::default(),
            ornaments: OrnamentConfig::default(),
            foliage_motion: MotionProfile::foliage(),
            ornament_motion: MotionProfile::ornament(),
            pearl_motion: MotionProfile::pearl(),
            topper: TopperConfig::default(),
            dust: DustConfig::default(),
            morph: MorphConfig::default(),
            gesture: GestureConfig::default(),
            camera: CameraAimConfig::default(),
            orbit: OrbitCamera::default(),
            sensor: SensorConfig::default(),
            root_y: -1.0,
            root_spin: 0.05,
        }
    }
}

impl TreeConfig {
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }

    /// Motion profile for a population tag.
    pub fn motion_for(&self, tag: PopulationTag) -> MotionProfile {
        match tag {
            PopulationTag::Foliage => self.foliage_motion.clone(),
            PopulationTag::Ornament(OrnamentKind::Pearl) => self.pearl_motion.clone(),
            PopulationTag::Ornament(_) => self.ornament_motion.clone(),
        }
    }

    /// Generate every morphing population, one per tag.
    pub fn build_populations<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> Vec<MorphPopulation> {
        let foliage = FoliageGenerator::new(self.foliage.clone()).generate(self.foliage.count, rng);
        let ornaments = OrnamentGenerator::new(self.ornaments.clone()).generate_all(rng);

        std::iter::once((PopulationTag::Foliage, foliage))
            .chain(ornaments.partition_by_tag())
            .filter(|(_, population)| !population.is_empty())
            .map(|(tag, population)| MorphPopulation {
                population,
                motion: self.motion_for(tag),
            })
            .collect()
    }
}

/// Scene colours.
pub mod palette {
    use bevy::prelude::Color;

    const fn hex(rgb: u32) -> Color {
        Color::srgb(
            ((rgb >> 16) & 0xff) as f32 / 255.0,
            ((rgb >> 8) & 0xff) as f32 / 255.0,
            (rgb & 0xff) as f32 / 255.0,
        )
    }

    pub const MINT_SOFT: Color = hex(0xA8E6CF);
    pub const MINT_DEEP: Color = hex(0x3D8B78);
    pub const ROSE_GOLD: Color = hex(0xE0BFB8);
    pub const CHAMPAGNE: Color = hex(0xF5E6CA);
    pub const PEARL_WHITE: Color = hex(0xF8F9FA);
    pub const VELVET_PINK: Color = hex(0xF4C2C2);
    pub const CRYSTAL_CLEAR: Color = hex(0xEEF5F5);
    pub const STARDUST_PURPLE: Color = hex(0xE6E6FA);
    pub const PEARL_CREAM: Color = hex(0xFDFCF0);
    pub const TRUNK: Color = hex(0x2A1D18);
    pub const MOONLIGHT: Color = hex(0xA0C0FF);
    /// Night-sky background and fog.
    pub const NIGHT: Color = hex(0x0F0A1E);
}

fn glow(color: Color, strength: f32) -> LinearRgba {
    let c = color.to_linear();
    LinearRgba::rgb(c.red * strength, c.green * strength, c.blue * strength)
}

fn population_name(tag: PopulationTag) -> &'static str {
    match tag {
        PopulationTag::Foliage => "Foliage",
        PopulationTag::Ornament(OrnamentKind::Crystal) => "Crystal ornaments",
        PopulationTag::Ornament(OrnamentKind::Metal) => "Metal ornaments",
        PopulationTag::Ornament(OrnamentKind::GiftBox) => "Gift boxes",
        PopulationTag::Ornament(OrnamentKind::Star) => "Star ornaments",
        PopulationTag::Ornament(OrnamentKind::Pearl) => "Pearls",
    }
}

/// Low-poly octahedron.
fn octahedron(radius: f32) -> Mesh {
    Sphere::new(radius).mesh().uv(4, 2)
}

fn population_mesh(tag: PopulationTag) -> Mesh {
    match tag {
        PopulationTag::Foliage => Sphere::new(0.05).mesh().uv(6, 4),
        PopulationTag::Ornament(OrnamentKind::Crystal) => Sphere::new(1.0)
            .mesh()
            .ico(0)
            .unwrap_or_else(|_| octahedron(1.0)),
        PopulationTag::Ornament(OrnamentKind::Metal) => Sphere::new(1.0).mesh().uv(32, 18),
        PopulationTag::Ornament(OrnamentKind::GiftBox) => Cuboid::from_length(1.5).into(),
        PopulationTag::Ornament(OrnamentKind::Star) => octahedron(1.0),
        PopulationTag::Ornament(OrnamentKind::Pearl) => Sphere::new(1.0).mesh().uv(16, 12),
    }
}

fn star_material() -> StandardMaterial {
    StandardMaterial {
        base_color: palette::CHAMPAGNE,
        emissive: glow(palette::CHAMPAGNE, 0.6),
        metallic: 0.9,
        perceptual_roughness: 0.2,
        ..default()
    }
}

fn population_material(tag: PopulationTag) -> StandardMaterial {
    match tag {
        PopulationTag::Foliage => StandardMaterial {
            base_color: palette::MINT_SOFT,
            emissive: glow(palette::MINT_DEEP, 0.8),
            perceptual_roughness: 0.9,
            ..default()
        },
        PopulationTag::Ornament(OrnamentKind::Crystal) => StandardMaterial {
            base_color: palette::CRYSTAL_CLEAR,
            emissive: glow(palette::PEARL_WHITE, 0.4),
            metallic: 0.1,
            perceptual_roughness: 0.0,
            specular_transmission: 1.0,
            thickness: 2.0,
            ior: 2.4,
            clearcoat: 1.0,
            ..default()
        },
        PopulationTag::Ornament(OrnamentKind::Metal) => StandardMaterial {
            base_color: palette::ROSE_GOLD,
            metallic: 1.0,
            perceptual_roughness: 0.2,
            clearcoat: 1.0,
            clearcoat_perceptual_roughness: 0.1,
            ..default()
        },
        PopulationTag::Ornament(OrnamentKind::GiftBox) => StandardMaterial {
            base_color: palette::VELVET_PINK,
            emissive: glow(palette::VELVET_PINK, 0.05),
            metallic: 0.1,
            perceptual_roughness: 0.8,
            ..default()
        },
        PopulationTag::Ornament(OrnamentKind::Star) => star_material(),
        PopulationTag::Ornament(OrnamentKind::Pearl) => StandardMaterial {
            base_color: palette::PEARL_CREAM,
            emissive: glow(palette::PEARL_CREAM, 0.3),
            perceptual_roughness: 0.05,
            clearcoat: 1.0,
            clearcoat_perceptual_roughness: 0.05,
            ..default()
        },
    }
}

/// Spawn one population parent plus one child per element.
fn spawn_population(
    commands: &mut Commands,
    parent: Entity,
    population: MorphPopulation,
    mesh: Handle<Mesh>,
    material: Handle<StandardMaterial>,
) -> Entity {
    let first = FrameTick::default();
    let tag = population
        .population
        .elements()
        .first()
        .map_or(PopulationTag::Foliage, |e| e.tag);
    let initial: Vec<Transform> = population
        .population
        .elements()
        .iter()
        .map(|e| element_transform(e, &population.motion, &first))
        .collect();

    let mut buffer = InstanceBuffer::with_capacity(initial.len());
    buffer.replace(initial.iter().copied());

    let owner = commands
        .spawn((
            Name::new(population_name(tag)),
            population,
            buffer,
            Transform::default(),
            Visibility::default(),
            ChildOf(parent),
        ))
        .id();

    for (index, transform) in initial.into_iter().enumerate() {
        commands.spawn((
            Mesh3d(mesh.clone()),
            MeshMaterial3d(material.clone()),
            transform,
            InstanceOf {
                buffer: owner,
                index,
            },
            ChildOf(owner),
        ));
    }
    owner
}

/// Startup system: build the whole scene from [`TreeConfig`].
pub fn spawn_tree(
    mut commands: Commands,
    config: Res<TreeConfig>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let mut rng = config.rng();

    commands.insert_resource(ClearColor(palette::NIGHT));

    let root = commands
        .spawn((
            Name::new("Tree"),
            TreeRoot {
                spin_rate: config.root_spin,
            },
            Transform::from_xyz(0.0, config.root_y, 0.0),
            Visibility::default(),
        ))
        .id();

    let populations = config.build_populations(&mut rng);
    let total: usize = populations.iter().map(|p| p.population.len()).sum();
    for population in populations {
        let Some(tag) = population.population.elements().first().map(|e| e.tag) else {
            continue;
        };
        let mesh = meshes.add(population_mesh(tag));
        let material = materials.add(population_material(tag));
        spawn_population(&mut commands, root, population, mesh, material);
    }
    bevy::log::info!("spawned tree with {total} morphing elements");

    // Trunk and inner glow stay fixed inside the group.
    commands.spawn((
        Name::new("Trunk"),
        Mesh3d(meshes.add(ConicalFrustum {
            radius_top: 0.2,
            radius_bottom: 0.5,
            height: 1.5,
        })),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: palette::TRUNK,
            perceptual_roughness: 0.9,
            ..default()
        })),
        Transform::from_xyz(0.0, -1.8, 0.0),
        ChildOf(root),
    ));
    commands.spawn((
        Name::new("Inner glow"),
        PointLight {
            color: palette::MINT_SOFT,
            intensity: 200_000.0,
            range: 5.0,
            ..default()
        },
        Transform::from_xyz(0.0, 1.0, 0.0),
        ChildOf(root),
    ));

    let topper = Topper {
        motion: config.topper.clone(),
    };
    commands.spawn((
        Name::new("Topper"),
        Mesh3d(meshes.add(octahedron(0.3))),
        MeshMaterial3d(materials.add(star_material())),
        topper_transform(&topper.motion, &FrameTick::default()),
        topper,
        ChildOf(root),
    ));

    spawn_dust(&mut commands, &config.dust, &mut rng, &mut meshes, &mut materials);

    let orbit = config.orbit.clone();
    commands.spawn((
        Name::new("Camera"),
        Camera3d::default(),
        Projection::Perspective(PerspectiveProjection {
            fov: 45f32.to_radians(),
            ..default()
        }),
        orbit.transform(Vec3::ZERO),
        orbit,
        DistanceFog {
            color: palette::NIGHT,
            falloff: FogFalloff::Linear {
                start: 10.0,
                end: 40.0,
            },
            ..default()
        },
    ));

    commands.spawn((
        Name::new("Key light"),
        SpotLight {
            color: palette::CHAMPAGNE,
            intensity: 4_000_000.0,
            outer_angle: 0.25,
            inner_angle: 0.0,
            shadows_enabled: true,
            range: 40.0,
            ..default()
        },
        Transform::from_xyz(5.0, 12.0, 5.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
    commands.spawn((
        Name::new("Rim light"),
        PointLight {
            color: palette::ROSE_GOLD,
            intensity: 1_500_000.0,
            range: 30.0,
            ..default()
        },
        Transform::from_xyz(-5.0, 5.0, -5.0),
    ));
    commands.spawn((
        Name::new("Fill light"),
        PointLight {
            color: palette::MOONLIGHT,
            intensity: 500_000.0,
            range: 20.0,
            ..default()
        },
        Transform::from_xyz(0.0, -2.0, 4.0),
    ));
}

fn spawn_dust(
    commands: &mut Commands,
    config: &DustConfig,
    rng: &mut StdRng,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
) {
    let cloud = DustCloud::new(config.clone(), rng);
    let mut buffer = InstanceBuffer::with_capacity(cloud.motes().len());
    cloud.write_instances(&mut buffer);

    let mesh = meshes.add(Sphere::new(1.0).mesh().uv(4, 3));
    let material = materials.add(StandardMaterial {
        base_color: palette::STARDUST_PURPLE.with_alpha(0.8),
        emissive: glow(palette::STARDUST_PURPLE, 1.0),
        alpha_mode: AlphaMode::Add,
        unlit: true,
        ..default()
    });

    let initial = buffer.transforms().to_vec();
    let owner = commands
        .spawn((
            Name::new("Fairy dust"),
            cloud,
            buffer,
            Transform::default(),
            Visibility::default(),
        ))
        .id();
    for (index, transform) in initial.into_iter().enumerate() {
        commands.spawn((
            Mesh3d(mesh.clone()),
            MeshMaterial3d(material.clone()),
            transform,
            InstanceOf {
                buffer: owner,
                index,
            },
            ChildOf(owner),
        ));
    }
}
