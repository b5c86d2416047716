use crate::config::{ConfigError, StageConfig};
use crate::hooks::StageId;
use crate::subst::{substitute, EnvSource, SubstContext};

/// Ports a stage declares itself: configured mappings followed by the SSH
/// mapping when SSH is enabled with a host port.
pub fn own_ports(
    stage: StageId,
    config: &StageConfig,
    env: &impl EnvSource,
) -> Result<Vec<String>, ConfigError> {
    let mut ports = Vec::with_capacity(config.ports.len() + 1);
    for (idx, raw) in config.ports.iter().enumerate() {
        let field = format!("{}.ports[{idx}]", stage.config_key());
        ports.push(
            substitute(raw, env, SubstContext::Manifest)
                .map_err(|e| ConfigError::subst(field, e))?,
        );
    }

    if config.ssh.enable {
        if let Some(host_port) = &config.ssh.host_port {
            let field = format!("{}.ssh.host_port", stage.config_key());
            let host = substitute(host_port, env, SubstContext::Manifest)
                .map_err(|e| ConfigError::subst(field, e))?;
            ports.push(format!("{host}:{}", config.ssh.port));
        }
    }
    Ok(ports)
}

/// Stage-2 publishes everything stage-1 does, then its own mappings.
pub fn compose_ports(inherited: &[String], own: &[String]) -> Vec<String> {
    inherited.iter().chain(own).cloned().collect()
}
