use crate::domain::{ImageRuntime, PullPolicy};
use anyhow::{Context, Result, bail};
use clap::Subcommand;
use std::path::PathBuf;
use tracing::info;

#[derive(Subcommand, Debug)]
pub enum RuntimeAction {
    /// Fetch an image into the store and print its hash
    Fetch {
        image: String,
        /// Accept unsigned images for this fetch only
        #[arg(long)]
        insecure: bool,
        #[arg(long = "policy", value_enum, default_value_t = PullPolicy::New)]
        policy: PullPolicy,
    },
    /// Print the manifest of a stored image
    CatManifest { image: String },
    /// Remove images from the store
    ImageRm {
        #[arg(required = true)]
        images: Vec<String>,
    },
    /// Remove pods by uuid
    Rm {
        #[arg(conflicts_with = "uuid_file", required_unless_present = "uuid_file")]
        uuids: Vec<String>,
        /// File holding the uuid of the pod to remove
        #[arg(long)]
        uuid_file: Option<PathBuf>,
    },
    /// Run a pod, passing every argument through to the runtime
    Run {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        args: Vec<String>,
    },
}

pub fn run(action: RuntimeAction, runtime: &dyn ImageRuntime) -> Result<()> {
    match action {
        RuntimeAction::Fetch {
            image,
            insecure,
            policy,
        } => {
            let hash = if insecure {
                runtime.fetch_insecure(&image)?
            } else {
                runtime.fetch(&image, policy)?
            };
            info!("Fetched {} as {}", image, hash);
            println!("{hash}");
        }
        RuntimeAction::CatManifest { image } => {
            let manifest = runtime.cat_manifest(&image)?;
            println!("{}", manifest.trim_end());
        }
        RuntimeAction::ImageRm { images } => runtime.image_rm(&images)?,
        RuntimeAction::Rm { uuids, uuid_file } => {
            let output = match uuid_file {
                Some(path) => runtime.rm_from_file(&path)?,
                None if uuids.is_empty() => bail!("No pod to remove"),
                None => runtime.rm(&uuids)?,
            };
            print!("{}", output.stdout);
        }
        RuntimeAction::Run { args } => runtime
            .run(&args)
            .context("Pod exited with an error")?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockRuntime, image_manifest_json};

    #[test]
    fn fetch_passes_policy() {
        let mock = MockRuntime::new();
        run(
            RuntimeAction::Fetch {
                image: "example.com/foo:1".into(),
                insecure: false,
                policy: PullPolicy::Update,
            },
            &mock,
        )
        .unwrap();

        assert_eq!(mock.get_commands(), vec!["fetch:example.com/foo:1 update"]);
    }

    #[test]
    fn insecure_fetch_uses_dedicated_call() {
        let mock = MockRuntime::new();
        run(
            RuntimeAction::Fetch {
                image: "example.com/foo:1".into(),
                insecure: true,
                policy: PullPolicy::New,
            },
            &mock,
        )
        .unwrap();

        assert_eq!(mock.commands_for("fetch_insecure").len(), 1);
        assert_eq!(mock.commands_for("fetch").len(), 0);
    }

    #[test]
    fn rm_prefers_uuid_file() {
        let mock = MockRuntime::new();
        run(
            RuntimeAction::Rm {
                uuids: vec![],
                uuid_file: Some(PathBuf::from("/tmp/pod.uuid")),
            },
            &mock,
        )
        .unwrap();

        assert_eq!(mock.get_commands(), vec!["rm_from_file:/tmp/pod.uuid"]);
    }

    #[test]
    fn rm_without_targets_fails() {
        let mock = MockRuntime::new();
        let err = run(
            RuntimeAction::Rm {
                uuids: vec![],
                uuid_file: None,
            },
            &mock,
        )
        .unwrap_err();

        assert!(err.to_string().contains("No pod"));
        assert!(mock.get_commands().is_empty());
    }

    #[test]
    fn cat_manifest_of_missing_image_fails() {
        let mock = MockRuntime::new();
        mock.add_image("example.com/foo:1", &image_manifest_json("example.com/foo", "1"));

        assert!(
            run(
                RuntimeAction::CatManifest {
                    image: "example.com/foo:1".into()
                },
                &mock
            )
            .is_ok()
        );
        assert!(
            run(
                RuntimeAction::CatManifest {
                    image: "example.com/bar:1".into()
                },
                &mock
            )
            .is_err()
        );
    }

    #[test]
    fn run_failure_is_reported() {
        let mock = MockRuntime::new();
        mock.set_fail_on("run");

        let err = run(
            RuntimeAction::Run {
                args: vec!["example.com/foo:1".into()],
            },
            &mock,
        )
        .unwrap_err();

        assert!(err.to_string().contains("Pod exited"));
    }
}
