use std::collections::BTreeMap;

/// The pieces needed to build one `forge script` invocation. Caller-supplied env overrides
/// system env for duplicate keys; that merge happens at spawn time, not here.
#[derive(Debug, Clone)]
pub struct ScriptInvocation {
    pub script_path: String,
    pub ffi: bool,
    pub sig: Option<(String, Vec<String>)>,
    pub rpc_url: Option<String>,
    pub broadcast: bool,
    pub verify: bool,
    pub json: bool,
    pub extra_args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl ScriptInvocation {
    /// Builds the `forge script <path> ...` argument vector per the documented pattern.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec!["script".to_string(), self.script_path.clone()];
        if self.ffi {
            args.push("--ffi".to_string());
        }
        if let Some((func, func_args)) = &self.sig {
            args.push("--sig".to_string());
            args.push(func.clone());
            args.extend(func_args.iter().cloned());
        }
        if let Some(rpc_url) = &self.rpc_url {
            args.push("--rpc-url".to_string());
            args.push(rpc_url.clone());
        }
        if self.broadcast {
            args.push("--broadcast".to_string());
            if self.verify {
                args.push("--verify".to_string());
            }
        }
        if self.json {
            args.push("--json".to_string());
        }
        args.push("-vvvv".to_string());
        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// Merges caller-supplied env over the given system env snapshot; caller keys win.
    pub fn merged_env(&self, system_env: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut merged = system_env.clone();
        merged.extend(self.env.clone());
        merged
    }

    /// Whether this invocation runs in the non-JSON debug mode, in which the runner streams
    /// bytes to stdout unparsed rather than invoking the Output Processor.
    pub fn is_debug_passthrough(&self) -> bool {
        !self.json
    }
}
