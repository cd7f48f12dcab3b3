use crate::services::pod::POD_MANIFEST;
use crate::services::{Aci, BuildContext, Pod};
use anyhow::Result;
use clap::Args;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Build,
    Clean,
    Install,
    Test,
}

#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Pod or ACI directory
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

/// What a project directory holds.
pub enum Project {
    Pod(Pod),
    Aci(Aci),
}

impl Project {
    pub fn open(path: &Path, ctx: BuildContext) -> Result<Self> {
        if path.join(POD_MANIFEST).exists() {
            Ok(Self::Pod(Pod::new(path, ctx)?))
        } else {
            Ok(Self::Aci(Aci::new(path, ctx)?))
        }
    }
}

pub fn run(step: Lifecycle, args: &TargetArgs, ctx: BuildContext) -> Result<()> {
    match (Project::open(&args.path, ctx)?, step) {
        (Project::Pod(pod), Lifecycle::Build) => pod.build(),
        (Project::Pod(pod), Lifecycle::Clean) => {
            pod.clean();
            Ok(())
        }
        (Project::Pod(pod), Lifecycle::Install) => {
            for hash in pod.install()? {
                println!("{hash}");
            }
            Ok(())
        }
        (Project::Pod(pod), Lifecycle::Test) => pod.test(),
        (Project::Aci(mut aci), Lifecycle::Build) => aci.build(),
        (Project::Aci(mut aci), Lifecycle::Clean) => {
            aci.clean();
            Ok(())
        }
        (Project::Aci(mut aci), Lifecycle::Install) => {
            println!("{}", aci.install()?);
            Ok(())
        }
        (Project::Aci(mut aci), Lifecycle::Test) => aci.test(),
    }
}
