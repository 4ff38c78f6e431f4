//! A toy process scheduler fed by the shell. Each command line becomes a
//! simulated process with an estimated burst time; the scheduler replays it
//! under FCFS, round-robin or shortest-job-first and reports through debug
//! logging only. It never drives filesystem work.

use std::collections::VecDeque;

use log::debug;

const TIME_SLICE: u32 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessState {
    Ready,
    Running,
    Terminated,
}

/// Scheduling policy for picking the next ready process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(dead_code)]
pub enum Policy {
    /// First come, first served
    Fcfs,
    /// Round robin with a fixed time slice
    RoundRobin,
    /// Non-preemptive shortest job first
    Sjf,
}

#[derive(Debug)]
#[allow(dead_code)]
pub struct Process {
    pub pid: u32,
    pub command: String,
    pub state: ProcessState,
    pub burst: u32,
    pub remaining: u32,
    pub waiting: u32,
}

pub struct Scheduler {
    ready: VecDeque<Process>,
    running: Option<Process>,
    finished: Vec<Process>,
    policy: Policy,
    slice_used: u32,
    next_pid: u32,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            ready: VecDeque::new(),
            running: None,
            finished: Vec::new(),
            policy: Policy::Fcfs,
            slice_used: 0,
            next_pid: 1,
        }
    }

    #[allow(dead_code)]
    pub fn set_policy(&mut self, policy: Policy) {
        self.policy = policy;
    }

    /// Queue a simulated process for `command`.
    pub fn submit(&mut self, command: &str) {
        let burst = estimate_burst(command);
        let pid = self.next_pid;
        self.next_pid += 1;
        debug!("[sched] new process {pid}: '{command}', burst={burst}");
        self.ready.push_back(Process {
            pid,
            command: command.to_string(),
            state: ProcessState::Ready,
            burst,
            remaining: burst,
            waiting: 0,
        });
    }

    /// One simulated time unit.
    pub fn tick(&mut self) {
        for process in &mut self.ready {
            process.waiting += 1;
        }
        if self.running.is_none() {
            self.schedule();
        }
        let Some(mut process) = self.running.take() else {
            return;
        };
        process.remaining -= 1;
        self.slice_used += 1;

        if process.remaining == 0 {
            debug!(
                "[sched] process {} ('{}') finished after waiting {}",
                process.pid, process.command, process.waiting
            );
            process.state = ProcessState::Terminated;
            self.finished.push(process);
            self.schedule();
        } else if self.policy == Policy::RoundRobin && self.slice_used >= TIME_SLICE {
            debug!(
                "[sched] time slice end for pid {}, back to ready queue",
                process.pid
            );
            process.state = ProcessState::Ready;
            self.ready.push_back(process);
            self.schedule();
        } else {
            self.running = Some(process);
        }
    }

    /// Tick until no process is ready or running.
    pub fn run_to_idle(&mut self) {
        while self.running.is_some() || !self.ready.is_empty() {
            self.tick();
        }
    }

    fn schedule(&mut self) {
        if self.policy == Policy::Sjf {
            self.ready
                .make_contiguous()
                .sort_by_key(|process| process.remaining);
        }
        if let Some(mut process) = self.ready.pop_front() {
            process.state = ProcessState::Running;
            self.slice_used = 0;
            debug!("[sched] running pid {} ('{}')", process.pid, process.command);
            self.running = Some(process);
        }
    }

    #[allow(dead_code)]
    pub fn finished(&self) -> &[Process] {
        &self.finished
    }

    #[allow(dead_code)]
    pub fn running_pid(&self) -> Option<u32> {
        self.running.as_ref().map(|process| process.pid)
    }
}

/// Deterministic stand-in for a measured burst time.
fn estimate_burst(command: &str) -> u32 {
    let mut burst = 5 + (command.len() as u32) % 10;
    if command.contains("cat") {
        burst += 5;
    }
    if command.contains("echo") {
        burst += 3;
    }
    burst
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fcfs_finishes_in_submission_order() {
        let mut sched = Scheduler::new();
        sched.submit("ls /");
        sched.submit("mkdir /a");
        sched.submit("pwd");
        sched.run_to_idle();
        let pids: Vec<u32> = sched.finished().iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![1, 2, 3]);
        assert!(sched
            .finished()
            .iter()
            .all(|p| p.state == ProcessState::Terminated && p.remaining == 0));
    }

    #[test]
    fn sjf_picks_the_shortest_job_first() {
        let mut sched = Scheduler::new();
        sched.set_policy(Policy::Sjf);
        let long = "x".repeat(9); // burst 5 + 9
        sched.submit(&long);
        sched.submit("y"); // burst 5 + 1
        sched.run_to_idle();
        let pids: Vec<u32> = sched.finished().iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![2, 1]);
    }

    #[test]
    fn round_robin_rotates_at_the_slice_boundary() {
        let mut sched = Scheduler::new();
        sched.set_policy(Policy::RoundRobin);
        let first = "x".repeat(5); // burst 10
        let second = "y".repeat(5); // burst 10
        sched.submit(&first);
        sched.submit(&second);

        sched.tick();
        assert_eq!(sched.running_pid(), Some(1));
        for _ in 0..TIME_SLICE {
            sched.tick();
        }
        assert_eq!(sched.running_pid(), Some(2));
        sched.run_to_idle();
        assert_eq!(sched.finished().len(), 2);
    }

    #[test]
    fn burst_estimates_are_deterministic() {
        assert_eq!(estimate_burst("ls"), 7);
        assert_eq!(estimate_burst("cat /f"), 5 + 6 + 5);
        assert_eq!(estimate_burst("echo \"x\" > /f"), 5 + 3 + 3);
    }
}
