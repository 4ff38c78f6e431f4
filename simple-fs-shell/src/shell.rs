//! The command loop: read a line, split it into tokens, call into the
//! filesystem engine and print the result. Errors become one-line messages;
//! exit codes carry no meaning.

use std::io::{self, BufRead, Write};

use simple_fs::{InodeKind, OpenFlags, SimFileSystem};

use crate::sched::Scheduler;

pub struct Shell {
    fs: SimFileSystem,
    sched: Scheduler,
}

impl Shell {
    pub fn new(fs: SimFileSystem) -> Self {
        Self {
            fs,
            sched: Scheduler::new(),
        }
    }

    /// Prompt/read/execute until `exit` or end of input.
    pub fn run(&mut self) -> io::Result<()> {
        let stdin = io::stdin();
        let mut line = String::new();
        loop {
            self.print_prompt()?;
            line.clear();
            if stdin.lock().read_line(&mut line)? == 0 {
                break;
            }
            let command = line.trim();
            if command.is_empty() {
                continue;
            }
            if !self.execute(command)? {
                break;
            }
        }
        Ok(())
    }

    fn print_prompt(&mut self) -> io::Result<()> {
        let cwd = self.fs.cwd().unwrap_or_else(|_| String::from("?"));
        print!("sfs:{cwd}$ ");
        io::stdout().flush()
    }

    /// Run one command line. Returns `false` when the shell should exit.
    fn execute(&mut self, line: &str) -> io::Result<bool> {
        self.sched.submit(line);
        self.sched.run_to_idle();

        let args = tokenize(line);
        match args[0].as_str() {
            "ls" => self.cmd_ls(&args),
            "cd" => self.cmd_cd(&args),
            "pwd" | "cwd" => self.cmd_pwd(),
            "mkdir" => self.cmd_mkdir(&args),
            "touch" => self.cmd_touch(&args),
            "rm" => self.cmd_rm(&args),
            "rmdir" => self.cmd_rmdir(&args),
            "echo" => self.cmd_echo(line),
            "cat" => self.cmd_cat(&args),
            "format" => self.cmd_format()?,
            "help" => print_help(),
            "exit" => {
                println!("bye");
                return Ok(false);
            }
            "create" => self.cmd_create(&args),
            "open" => self.cmd_open(&args),
            "read" => self.cmd_read(&args),
            "write" => self.cmd_write(line, &args),
            "close" => self.cmd_close(&args),
            unknown => println!("unknown command: {unknown}"),
        }
        Ok(true)
    }

    fn cmd_ls(&mut self, args: &[String]) {
        let path = args.get(1).map_or(".", String::as_str);
        match self.fs.ls(path) {
            Ok(entries) => {
                for entry in entries {
                    match entry.kind {
                        InodeKind::Directory => println!("d  {}/", entry.name),
                        InodeKind::Regular => {
                            println!("f  {}  ({} bytes)", entry.name, entry.size);
                        }
                    }
                }
            }
            Err(e) => println!("ls: {path}: {e}"),
        }
    }

    fn cmd_cd(&mut self, args: &[String]) {
        let path = args.get(1).map_or("/", String::as_str);
        if let Err(e) = self.fs.chdir(path) {
            println!("cd: {path}: {e}");
        }
    }

    fn cmd_pwd(&mut self) {
        match self.fs.cwd() {
            Ok(path) => println!("{path}"),
            Err(e) => println!("pwd: {e}"),
        }
    }

    fn cmd_mkdir(&mut self, args: &[String]) {
        let Some(path) = args.get(1) else {
            println!("usage: mkdir <path>");
            return;
        };
        if let Err(e) = self.fs.mkdir(path) {
            println!("mkdir: {path}: {e}");
        }
    }

    fn cmd_touch(&mut self, args: &[String]) {
        let Some(path) = args.get(1) else {
            println!("usage: touch <path>");
            return;
        };
        if let Err(e) = self.fs.create(path) {
            println!("touch: {path}: {e}");
        }
    }

    fn cmd_rm(&mut self, args: &[String]) {
        let (recursive, force, paths) = parse_rm_args(&args[1..]);
        if paths.is_empty() {
            println!("usage: rm [-r] [-f] <path>...");
            return;
        }
        for path in paths {
            if let Err(e) = self.fs.rm(&path, recursive, force) {
                println!("rm: cannot remove '{path}': {e}");
            }
        }
    }

    fn cmd_rmdir(&mut self, args: &[String]) {
        let Some(path) = args.get(1) else {
            println!("usage: rmdir <path>");
            return;
        };
        if let Err(e) = self.fs.rmdir(path) {
            println!("rmdir: {path}: {e}");
        }
    }

    fn cmd_echo(&mut self, line: &str) {
        let Some((content, path)) = parse_echo(line) else {
            println!("usage: echo \"content\" > <path>");
            return;
        };
        let flags = OpenFlags::WRONLY | OpenFlags::CREAT | OpenFlags::TRUNC;
        let result = self.fs.open(&path, flags).and_then(|fd| {
            let written = self.fs.write(fd, content.as_bytes());
            self.fs.close(fd)?;
            written
        });
        if let Err(e) = result {
            println!("echo: {path}: {e}");
        }
    }

    fn cmd_cat(&mut self, args: &[String]) {
        let Some(path) = args.get(1) else {
            println!("usage: cat <path>");
            return;
        };
        match self.fs.open(path, OpenFlags::RDONLY) {
            Ok(fd) => {
                let mut content = Vec::new();
                loop {
                    match self.fs.read(fd, 4096) {
                        Ok(chunk) if chunk.is_empty() => break,
                        Ok(chunk) => content.extend_from_slice(&chunk),
                        Err(e) => {
                            println!("cat: {path}: {e}");
                            break;
                        }
                    }
                }
                print!("{}", String::from_utf8_lossy(&content));
                if !content.ends_with(b"\n") {
                    println!();
                }
                let _ = self.fs.close(fd);
            }
            Err(e) => println!("cat: {path}: {e}"),
        }
    }

    fn cmd_format(&mut self) -> io::Result<()> {
        print!("WARNING: this will erase all data on the disk. Are you sure? (y/n): ");
        io::stdout().flush()?;
        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        if matches!(answer.trim(), "y" | "Y") {
            match self.fs.format() {
                Ok(()) => println!("disk formatted"),
                Err(e) => println!("format: {e}"),
            }
        } else {
            println!("format aborted");
        }
        Ok(())
    }

    fn cmd_create(&mut self, args: &[String]) {
        let Some(path) = args.get(1) else {
            println!("usage: create <path>");
            return;
        };
        match self.fs.create(path) {
            Ok(()) => println!("ok"),
            Err(e) => println!("err: {e}"),
        }
    }

    fn cmd_open(&mut self, args: &[String]) {
        let Some(path) = args.get(1) else {
            println!("usage: open <path> [flags]");
            return;
        };
        let bits = match args.get(2) {
            Some(word) => match parse_int(word) {
                Some(bits) => bits,
                None => {
                    println!("open: bad flags word '{word}'");
                    return;
                }
            },
            None => i64::from(OpenFlags::RDWR.bits()),
        };
        let Some(flags) = u32::try_from(bits).ok().and_then(OpenFlags::from_bits) else {
            println!("open: bad flags word '{bits}'");
            return;
        };
        match self.fs.open(path, flags) {
            Ok(fd) => println!("fd={fd}"),
            Err(e) => println!("err: {e}"),
        }
    }

    fn cmd_read(&mut self, args: &[String]) {
        let (Some(fd), Some(count)) = (
            args.get(1).and_then(|w| parse_int(w)),
            args.get(2).and_then(|w| parse_int(w)),
        ) else {
            println!("usage: read <fd> <n>");
            return;
        };
        match self.fs.read(fd as usize, count as usize) {
            Ok(bytes) => println!("{}", String::from_utf8_lossy(&bytes)),
            Err(e) => println!("err: {e}"),
        }
    }

    fn cmd_write(&mut self, line: &str, args: &[String]) {
        let Some(fd) = args.get(1).and_then(|w| parse_int(w)) else {
            println!("usage: write <fd> <text>");
            return;
        };
        if args.len() < 3 {
            println!("usage: write <fd> <text>");
            return;
        }
        let data = rest_after_tokens(line, 2);
        match self.fs.write(fd as usize, data.as_bytes()) {
            Ok(_) => println!("ok"),
            Err(e) => println!("err: {e}"),
        }
    }

    fn cmd_close(&mut self, args: &[String]) {
        let Some(fd) = args.get(1).and_then(|w| parse_int(w)) else {
            println!("usage: close <fd>");
            return;
        };
        match self.fs.close(fd as usize) {
            Ok(()) => println!("ok"),
            Err(e) => println!("err: {e}"),
        }
    }
}

fn print_help() {
    println!("simple-fs shell - a simulated filesystem inside one disk image");
    println!("available commands:");
    println!("  format               formats the virtual disk");
    println!("  ls [path]            lists directory contents");
    println!("  cd [path]            changes the current directory");
    println!("  pwd                  prints the current directory");
    println!("  mkdir <path>         creates a directory");
    println!("  touch <path>         creates an empty file");
    println!("  echo \"text\" > <file> writes text to a file");
    println!("  cat <path>           prints file content");
    println!("  rm [-r] [-f] <path>  removes files or directories");
    println!("  rmdir <path>         removes an empty directory");
    println!("  create/open/read/write/close   raw engine calls");
    println!("  help                 shows this message");
    println!("  exit                 leaves the shell");
}

fn tokenize(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}

/// Collect `-rRfF` style flags and the remaining path operands.
fn parse_rm_args(args: &[String]) -> (bool, bool, Vec<String>) {
    let mut recursive = false;
    let mut force = false;
    let mut paths = Vec::new();
    for arg in args {
        if let Some(flags) = arg.strip_prefix('-') {
            for flag in flags.chars() {
                match flag {
                    'r' | 'R' => recursive = true,
                    'f' | 'F' => force = true,
                    other => println!("rm: unknown option -{other}"),
                }
            }
        } else {
            paths.push(arg.clone());
        }
    }
    (recursive, force, paths)
}

/// Parse `echo "content" > filename`, trimming whitespace around the
/// filename. The quoted content is taken literally.
fn parse_echo(line: &str) -> Option<(String, String)> {
    let first = line.find('"')?;
    let second = first + 1 + line[first + 1..].find('"')?;
    let redirect = second + line[second..].find('>')?;
    let content = line[first + 1..second].to_string();
    let path = line[redirect + 1..].trim().to_string();
    if path.is_empty() {
        return None;
    }
    Some((content, path))
}

/// Decimal or `0x`-prefixed hexadecimal integer.
fn parse_int(word: &str) -> Option<i64> {
    if let Some(hex) = word.strip_prefix("0x").or_else(|| word.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else {
        word.parse().ok()
    }
}

/// Everything after the first `skip` whitespace-separated tokens.
fn rest_after_tokens(line: &str, skip: usize) -> &str {
    let mut rest = line.trim_start();
    for _ in 0..skip {
        let cut = rest
            .find(char::is_whitespace)
            .unwrap_or(rest.len());
        rest = rest[cut..].trim_start();
    }
    rest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_on_any_whitespace() {
        assert_eq!(tokenize("rm  -rf\t/a /b"), vec!["rm", "-rf", "/a", "/b"]);
    }

    #[test]
    fn rm_args_accept_combined_and_repeated_flags() {
        let args: Vec<String> = ["-rf", "/a", "-R", "/b"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let (recursive, force, paths) = parse_rm_args(&args);
        assert!(recursive);
        assert!(force);
        assert_eq!(paths, vec!["/a", "/b"]);

        let args: Vec<String> = ["x", "y"].iter().map(|s| s.to_string()).collect();
        let (recursive, force, paths) = parse_rm_args(&args);
        assert!(!recursive);
        assert!(!force);
        assert_eq!(paths, vec!["x", "y"]);
    }

    #[test]
    fn echo_parsing_keeps_content_and_trims_filename() {
        let (content, path) = parse_echo("echo \"hello world\" >   /f.txt  ").unwrap();
        assert_eq!(content, "hello world");
        assert_eq!(path, "/f.txt");

        assert!(parse_echo("echo hello > /f").is_none());
        assert!(parse_echo("echo \"hello\"").is_none());
        assert!(parse_echo("echo \"hello\" >").is_none());
    }

    #[test]
    fn parse_int_reads_decimal_and_hex() {
        assert_eq!(parse_int("19"), Some(19));
        assert_eq!(parse_int("0x10"), Some(16));
        assert_eq!(parse_int("0X1f"), Some(31));
        assert_eq!(parse_int("abc"), None);
        assert_eq!(parse_int("19x"), None);
    }

    #[test]
    fn write_takes_the_raw_remainder_of_the_line() {
        assert_eq!(rest_after_tokens("write 3 hello  world", 2), "hello  world");
        assert_eq!(rest_after_tokens("write 3", 2), "");
    }
}
