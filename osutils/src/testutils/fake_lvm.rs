//! In-memory stand-in for the volume manager and the filesystem tools, used to
//! test code built on [`Executors`] without touching the host.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    os::unix::process::ExitStatusExt,
    process::{ExitStatus, Output},
    sync::{Arc, Mutex},
};

use crate::{
    dependencies::{Command, CommandOutput, Dependency, DependencyError},
    exe::{Executor, Executors},
};

/// Exit status LVM tools use for a failed command.
const LVM_FAILURE: i32 = 5;

/// Exit status `mount`/`umount` use for a failed mount operation, and
/// `mountpoint` uses for a path that is not a mount point.
const MOUNT_FAILURE: i32 = 32;

#[derive(Debug)]
enum Failure {
    Always,
    Times(usize),
}

#[derive(Debug)]
struct FakeVolume {
    name: String,
    size: u64,
    active: bool,
}

#[derive(Debug)]
struct FakeGroup {
    name: String,
    size: u64,
    uuid: String,
    volumes: Vec<FakeVolume>,
}

impl FakeGroup {
    fn free(&self) -> u64 {
        self.size - self.volumes.iter().map(|v| v.size).sum::<u64>()
    }
}

#[derive(Debug, Default)]
struct State {
    groups: Vec<FakeGroup>,
    calls: Vec<String>,
    failures: HashMap<Dependency, Failure>,
    mounts: BTreeMap<String, String>,
    directories: BTreeSet<String>,
    vgs_output: Option<String>,
    attr_output: Option<String>,
}

type Simulated = Result<String, (i32, String)>;

impl State {
    /// Consumes one injected failure for `dependency`, if any is pending.
    fn take_failure(&mut self, dependency: Dependency) -> bool {
        match self.failures.get_mut(&dependency) {
            Some(Failure::Always) => true,
            Some(Failure::Times(0)) | None => false,
            Some(Failure::Times(n)) => {
                *n -= 1;
                true
            }
        }
    }

    fn group_mut(&mut self, name: &str) -> Option<&mut FakeGroup> {
        self.groups.iter_mut().find(|g| g.name == name)
    }

    fn volume_mut(&mut self, target: &str) -> Option<&mut FakeVolume> {
        let (group, name) = target.split_once('/')?;
        self.group_mut(group)?
            .volumes
            .iter_mut()
            .find(|v| v.name == name)
    }

    fn simulate(&mut self, dependency: Dependency, args: &[String]) -> Simulated {
        match dependency {
            Dependency::Vgs => Ok(self.vgs()),
            Dependency::Lvs => Ok(self
                .groups
                .iter()
                .flat_map(|g| g.volumes.iter())
                .map(|v| format!("  {}\n", v.name))
                .collect()),
            Dependency::Lvdisplay => self.lvdisplay(args),
            Dependency::Lvcreate => self.lvcreate(args),
            Dependency::Lvremove => self.lvremove(args),
            Dependency::Mount => self.mount(args),
            Dependency::Umount => self.umount(args),
            Dependency::Mountpoint => self.mountpoint(args),
            Dependency::Mkdir => self.mkdir(args),
            Dependency::Rmdir => self.rmdir(args),
            _ => Ok(String::new()),
        }
    }

    fn vgs(&self) -> String {
        if let Some(output) = &self.vgs_output {
            return output.clone();
        }
        self.groups
            .iter()
            .map(|g| {
                format!(
                    "  {} {:.2} {:.2} {}\n",
                    g.name,
                    g.size as f64,
                    g.free() as f64,
                    g.uuid
                )
            })
            .collect()
    }

    fn lvdisplay(&mut self, args: &[String]) -> Simulated {
        let target = args.last().cloned().unwrap_or_default();
        let attr_output = self.attr_output.clone();
        match self.volume_mut(&target) {
            Some(_) if attr_output.is_some() => Ok(attr_output.unwrap_or_default()),
            Some(volume) => Ok(format!(
                "  -wi-{}-----\n",
                if volume.active { 'a' } else { '-' }
            )),
            None => Err((
                LVM_FAILURE,
                format!("  Failed to find logical volume \"{target}\"\n"),
            )),
        }
    }

    fn lvcreate(&mut self, args: &[String]) -> Simulated {
        let flag = |name: &str| {
            args.iter()
                .position(|a| a == name)
                .and_then(|i| args.get(i + 1))
                .cloned()
                .unwrap_or_default()
        };
        let name = flag("-n");
        let size: u64 = flag("-L").trim_end_matches('g').parse().unwrap_or(0);
        let group_name = args.last().cloned().unwrap_or_default();

        let Some(group) = self.group_mut(&group_name) else {
            return Err((
                LVM_FAILURE,
                format!("  Volume group \"{group_name}\" not found\n"),
            ));
        };
        if group.volumes.iter().any(|v| v.name == name) {
            return Err((
                LVM_FAILURE,
                format!("  Logical Volume \"{name}\" already exists in volume group \"{group_name}\"\n"),
            ));
        }
        if group.free() < size {
            return Err((
                LVM_FAILURE,
                format!("  Volume group \"{group_name}\" has insufficient free space\n"),
            ));
        }
        group.volumes.push(FakeVolume {
            name: name.clone(),
            size,
            active: true,
        });
        Ok(format!("  Logical volume \"{name}\" created.\n"))
    }

    fn lvremove(&mut self, args: &[String]) -> Simulated {
        let target = args.last().cloned().unwrap_or_default();
        let removed = target.split_once('/').and_then(|(group, name)| {
            let group = self.group_mut(group)?;
            let index = group.volumes.iter().position(|v| v.name == name)?;
            Some(group.volumes.remove(index))
        });
        match removed {
            Some(volume) => Ok(format!(
                "  Logical volume \"{}\" successfully removed.\n",
                volume.name
            )),
            None => Err((
                LVM_FAILURE,
                format!("  Failed to find logical volume \"{target}\"\n"),
            )),
        }
    }

    fn mount(&mut self, args: &[String]) -> Simulated {
        let [device, dir] = args else {
            return Err((1, "mount: bad usage\n".into()));
        };
        if !self.directories.contains(dir) {
            return Err((
                MOUNT_FAILURE,
                format!("mount: {dir}: mount point does not exist.\n"),
            ));
        }
        if self.mounts.contains_key(dir) {
            return Err((
                MOUNT_FAILURE,
                format!("mount: {dir}: {device} already mounted\n"),
            ));
        }
        self.mounts.insert(dir.clone(), device.clone());
        Ok(String::new())
    }

    fn umount(&mut self, args: &[String]) -> Simulated {
        let [dir] = args else {
            return Err((1, "umount: bad usage\n".into()));
        };
        match self.mounts.remove(dir) {
            Some(_) => Ok(String::new()),
            None => Err((MOUNT_FAILURE, format!("umount: {dir}: not mounted.\n"))),
        }
    }

    fn mountpoint(&self, args: &[String]) -> Simulated {
        match args.last() {
            Some(dir) if self.mounts.contains_key(dir) => Ok(String::new()),
            _ => Err((MOUNT_FAILURE, String::new())),
        }
    }

    fn mkdir(&mut self, args: &[String]) -> Simulated {
        let [dir] = args else {
            return Err((1, "mkdir: missing operand\n".into()));
        };
        if !self.directories.insert(dir.clone()) {
            return Err((
                1,
                format!("mkdir: cannot create directory '{dir}': File exists\n"),
            ));
        }
        Ok(String::new())
    }

    fn rmdir(&mut self, args: &[String]) -> Simulated {
        let [dir] = args else {
            return Err((1, "rmdir: missing operand\n".into()));
        };
        if self.mounts.contains_key(dir) {
            return Err((
                1,
                format!("rmdir: failed to remove '{dir}': Device or resource busy\n"),
            ));
        }
        if !self.directories.remove(dir) {
            return Err((
                1,
                format!("rmdir: failed to remove '{dir}': No such file or directory\n"),
            ));
        }
        Ok(String::new())
    }
}

/// Fake host tracking volume groups, logical volumes, directories and mounts,
/// and recording
/// every command it is asked to run.
#[derive(Debug, Default)]
pub struct FakeLvm {
    state: Mutex<State>,
}

impl FakeLvm {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A fake host with a single volume group of `size_gib` GiB.
    pub fn with_group(name: &str, size_gib: u64) -> Arc<Self> {
        let lvm = Self::new();
        lvm.add_group(name, size_gib);
        lvm
    }

    /// Executors running both tiers against this fake.
    pub fn executors(self: &Arc<Self>) -> Executors {
        Executors::new(self.clone(), self.clone())
    }

    pub fn add_group(&self, name: &str, size_gib: u64) {
        self.state.lock().unwrap().groups.push(FakeGroup {
            name: name.into(),
            size: size_gib,
            uuid: format!("{name}-uuid"),
            volumes: Vec::new(),
        });
    }

    /// Makes every future invocation of `dependency` fail.
    pub fn fail_always(&self, dependency: Dependency) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(dependency, Failure::Always);
    }

    /// Makes the next `times` invocations of `dependency` fail.
    pub fn fail_times(&self, dependency: Dependency, times: usize) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(dependency, Failure::Times(times));
    }

    /// Replaces the `vgs` listing with raw text.
    pub fn set_vgs_output(&self, output: Option<&str>) {
        self.state.lock().unwrap().vgs_output = output.map(Into::into);
    }

    /// Replaces the attribute string printed by `lvdisplay` for existing
    /// volumes.
    pub fn set_attr_output(&self, output: Option<&str>) {
        self.state.lock().unwrap().attr_output = output.map(Into::into);
    }

    pub fn set_active(&self, group: &str, name: &str, active: bool) {
        if let Some(volume) = self
            .state
            .lock()
            .unwrap()
            .volume_mut(&format!("{group}/{name}"))
        {
            volume.active = active;
        }
    }

    pub fn has_volume(&self, group: &str, name: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .volume_mut(&format!("{group}/{name}"))
            .is_some()
    }

    /// Device mounted at `dir`, if any.
    pub fn mount_source(&self, dir: &str) -> Option<String> {
        self.state.lock().unwrap().mounts.get(dir).cloned()
    }

    pub fn has_directory(&self, dir: &str) -> bool {
        self.state.lock().unwrap().directories.contains(dir)
    }

    /// Every command run so far, rendered.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Every command run so far that invoked `dependency`, rendered.
    pub fn calls_to(&self, dependency: Dependency) -> Vec<String> {
        let name = dependency.name();
        self.calls()
            .into_iter()
            .filter(|call| {
                call.split_whitespace()
                    .find(|part| *part != "env" && !part.contains('='))
                    == Some(name)
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }
}

impl Executor for FakeLvm {
    fn execute(&self, command: &Command) -> Result<String, Box<DependencyError>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(command.render_command());

        let args: Vec<String> = command
            .get_args()
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();

        let result = if state.take_failure(command.dependency()) {
            Err((1, format!("{}: injected failure\n", command.dependency())))
        } else {
            state.simulate(command.dependency(), &args)
        };

        let (code, stdout, stderr) = match result {
            Ok(stdout) => (0, stdout, String::new()),
            Err((code, stderr)) => (code, String::new(), stderr),
        };

        CommandOutput::new(
            command,
            Output {
                status: ExitStatus::from_raw(code << 8),
                stdout: stdout.into_bytes(),
                stderr: stderr.into_bytes(),
            },
        )
        .check_output()
    }
}
