//! Compose service manifest for the two stages.

use crate::dockerfile::{dockerfile_name, BASE_IMAGE_ARG, STAGE_LABEL};
use serde::Serialize;
use stagehand_schema::{
    ConfigFingerprint, MountKind, ResolvedProject, ResolvedStage, StageId, FINGERPRINT_LABEL,
};
use std::collections::BTreeMap;

pub const MANIFEST_FILE_NAME: &str = "docker-compose.yml";

#[derive(Debug, Serialize)]
pub struct ComposeFile {
    pub name: String,
    pub services: BTreeMap<String, Service>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub volumes: BTreeMap<String, VolumeDecl>,
}

#[derive(Debug, Serialize)]
pub struct Service {
    pub build: BuildSpec,
    pub image: String,
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    pub stdin_open: bool,
    pub tty: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy: Option<Deploy>,
}

#[derive(Debug, Serialize)]
pub struct BuildSpec {
    pub context: String,
    pub dockerfile: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct VolumeDecl {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct Deploy {
    pub resources: Resources,
}

#[derive(Debug, Serialize)]
pub struct Resources {
    pub reservations: Reservations,
}

#[derive(Debug, Serialize)]
pub struct Reservations {
    pub devices: Vec<DeviceRequest>,
}

#[derive(Debug, Serialize)]
pub struct DeviceRequest {
    pub driver: String,
    pub count: String,
    pub capabilities: Vec<String>,
}

impl Deploy {
    fn all_gpus() -> Self {
        Self {
            resources: Resources {
                reservations: Reservations {
                    devices: vec![DeviceRequest {
                        driver: "nvidia".to_owned(),
                        count: "all".to_owned(),
                        capabilities: vec!["gpu".to_owned()],
                    }],
                },
            },
        }
    }
}

fn service(
    stage: &ResolvedStage,
    parent_image: Option<&str>,
    fingerprint: &ConfigFingerprint,
) -> Service {
    let mut args = BTreeMap::new();
    if let Some(image) = parent_image {
        args.insert(BASE_IMAGE_ARG.to_owned(), image.to_owned());
    }

    let labels = BTreeMap::from([
        (FINGERPRINT_LABEL.to_owned(), fingerprint.hash.clone()),
        (STAGE_LABEL.to_owned(), stage.id.number().to_string()),
    ]);

    Service {
        build: BuildSpec {
            context: ".".to_owned(),
            dockerfile: dockerfile_name(stage.id),
            args,
        },
        image: stage.output_image.clone(),
        labels,
        environment: stage.environment.clone(),
        ports: stage.ports.clone(),
        volumes: stage
            .attachments()
            .map(|m| m.compose_spec(stage.id))
            .collect(),
        stdin_open: true,
        tty: true,
        deploy: stage.gpu.then(Deploy::all_gpus),
    }
}

pub fn build(project: &ResolvedProject, fingerprint: &ConfigFingerprint) -> ComposeFile {
    let mut services = BTreeMap::new();
    let mut volumes = BTreeMap::new();
    let mut parent_image: Option<&str> = None;

    for stage in &project.stages {
        services.insert(
            stage.id.name().to_owned(),
            service(stage, parent_image, fingerprint),
        );
        for mount in stage.attachments().filter(|m| m.kind == MountKind::Volume) {
            volumes.insert(
                mount.volume_key(stage.id),
                VolumeDecl {
                    name: mount.source.clone(),
                },
            );
        }
        if stage.id == StageId::One {
            parent_image = Some(&stage.output_image);
        }
    }

    ComposeFile {
        name: project.name.clone(),
        services,
        volumes,
    }
}

pub fn render(
    project: &ResolvedProject,
    fingerprint: &ConfigFingerprint,
) -> Result<String, serde_yaml::Error> {
    let body = serde_yaml::to_string(&build(project, fingerprint))?;
    Ok(format!("# Generated by stagehand. Do not edit.\n{body}"))
}
