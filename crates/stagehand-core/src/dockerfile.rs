use crate::wrapper::{profile_link, shell_quote, wrapper_path};
use stagehand_schema::paths::{
    image_environment, stage_generated_dir, APP_DIR, DATA_DIR, ENTRY_BINARY, INSTALL_DIR,
    LEDGER_DIR, LOGIN_PROFILE_FILE, WORKSPACE_DIR,
};
use stagehand_schema::{ConfigFingerprint, HookKind, ResolvedStage, StageId, FINGERPRINT_LABEL};
use std::fmt::Write as _;

/// Build argument through which stage-2 receives the stage-1 image.
pub const BASE_IMAGE_ARG: &str = "STAGEHAND_BASE_IMAGE";

/// Label naming the stage an image was built for.
pub const STAGE_LABEL: &str = "org.stagehand.stage";

/// Name of the entry binary inside the build context.
pub const ENTRY_BINARY_NAME: &str = "stagehand-entry";

pub fn dockerfile_name(stage: StageId) -> String {
    format!("{}.Dockerfile", stage.name())
}

fn json_string(value: &str) -> String {
    serde_json::Value::String(value.to_owned()).to_string()
}

/// Render the image build definition for one stage.
///
/// Stage-1 starts from its literal base image. Stage-2 starts from whatever
/// image the manifest passes in through [`BASE_IMAGE_ARG`], which is the
/// stage-1 output.
pub fn render(stage: &ResolvedStage, fingerprint: &ConfigFingerprint) -> String {
    let id = stage.id;
    let generated = stage_generated_dir(id);
    let mut out = String::from("# Generated by stagehand. Do not edit.\n");

    match &stage.base_image {
        Some(base) => {
            let _ = writeln!(out, "FROM {base}");
        }
        None => {
            let _ = writeln!(out, "ARG {BASE_IMAGE_ARG}");
            let _ = writeln!(out, "FROM ${{{BASE_IMAGE_ARG}}}");
        }
    }
    out.push('\n');

    let _ = writeln!(
        out,
        "LABEL {FINGERPRINT_LABEL}={} {STAGE_LABEL}={}",
        json_string(&fingerprint.hash),
        json_string(&id.number().to_string())
    );

    let env = image_environment(id);
    let last = env.len().saturating_sub(1);
    for (idx, (name, value)) in env.iter().enumerate() {
        let lead = if idx == 0 { "ENV " } else { "    " };
        let tail = if idx == last { "" } else { " \\" };
        let _ = writeln!(out, "{lead}{name}={}{tail}", json_string(value));
    }
    out.push('\n');

    let _ = writeln!(out, "COPY {ENTRY_BINARY_NAME} {ENTRY_BINARY}");
    let _ = writeln!(out, "COPY installation {INSTALL_DIR}");
    let _ = writeln!(out, "COPY generated/{} {generated}", id.name());

    let _ = writeln!(
        out,
        "RUN chmod 0755 {ENTRY_BINARY} \\\n    \
         && find {generated} -name '*.sh' -exec chmod 0755 {{}} + \\\n    \
         && mkdir -p {LEDGER_DIR} {APP_DIR} {DATA_DIR} {WORKSPACE_DIR} \\\n    \
         && ln -sf {} {}",
        shell_quote(&format!("{generated}/{LOGIN_PROFILE_FILE}")),
        shell_quote(&profile_link(id)),
    );

    if !stage.hooks.get(HookKind::OnBuild).is_empty() {
        let _ = writeln!(out, "RUN {}", wrapper_path(id, HookKind::OnBuild));
    }

    out.push('\n');
    let _ = writeln!(out, "ENTRYPOINT [{}]", json_string(ENTRY_BINARY));
    out
}
