//! Build script: embeds the git hash and checks GPU toolkits.
//!
//! whisper-rs-sys fails late and noisily when a GPU toolkit is missing, so the
//! GPU features are checked here before it starts compiling.

use std::process::Command;

fn main() {
    // Embed git short hash for version string
    if let Ok(output) = Command::new("git")
        .args(["rev-parse", "--short=7", "HEAD"])
        .output()
        && output.status.success()
    {
        let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        println!("cargo:rustc-env=GIT_HASH={}", hash);
    }
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");

    let toolkits = [
        (cfg!(feature = "cuda"), "CUDA", "nvcc", &["--version"][..], "https://developer.nvidia.com/cuda-downloads"),
        (cfg!(feature = "vulkan"), "Vulkan SDK", "vulkaninfo", &["--summary"][..], "https://vulkan.lunarg.com/"),
        (cfg!(feature = "hipblas"), "ROCm", "rocminfo", &[][..], "https://rocm.docs.amd.com/"),
        (cfg!(feature = "openblas"), "OpenBLAS", "pkg-config", &["--exists", "openblas"][..], "sudo apt install libopenblas-dev"),
    ];

    for (enabled, name, program, args, install) in toolkits {
        if !enabled {
            continue;
        }
        let found = Command::new(program)
            .args(args)
            .status()
            .is_ok_and(|s| s.success());
        if !found {
            panic!(
                "\n\n{name} not found (`{program}` failed).\n\
                 Install: {install}\n\
                 Or build without GPU support: cargo build --release\n"
            );
        }
        println!("cargo::warning={name} detected");
    }
}
