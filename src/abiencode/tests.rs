mod abitype;

use super::*;
use core::fmt::Debug;

/*
Python code to split output from remix into chunks of 32 bytes, the annotations
are done manually.
```python
s = "..."
print(*(s[i:i+64] for i in range(0, len(s), 64)), sep="\n")
```
*/

struct Slot<'a>(&'a [u8]);

impl<'a> Debug for Slot<'a> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for b in self.0 {
            f.write_fmt(format_args!("{:02x}", b))?;
        }
        Ok(())
    }
}

impl<'a> PartialEq for Slot<'a> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

macro_rules! expected_iter {
    ( $expected:expr ) => {
        // Iterate over the expected content, extracting the slot information
        // (32-byte hex string at the beginning, skipping empty lines). You can add
        // additional comments (// is not required) after the slot to explain what a
        // slot does.
        $expected
            .split("\n")
            .filter(|&line| !line.trim().is_empty())
            .map(|line| {
                if line.trim().len() < 64 {
                    panic!("expected line is too short, it must start with a 32 byte hex string!");
                };
                (
                    &line.trim()[..64], // Data to compare
                    line,               // Line to display
                )
            })
    };
}

/// Compare `actual` slot by slot against the annotated `expected` listing.
pub fn assert_slots(actual: &[u8], expected: &str) {
    assert_eq!(actual.len() % 32, 0, "encoding is not slot aligned");

    let mut expected_iter = expected_iter!(expected);
    for slot in actual.chunks(32) {
        match expected_iter.next() {
            Some((expected, line)) => {
                println!("{}", line);
                let expected = hex::decode(expected).unwrap();
                assert_eq!(
                    Slot(slot),
                    Slot(expected.as_slice()),
                    "slot did not match the expected value"
                );
            }
            None => panic!("Expected end of data, got {:?}", Slot(slot)),
        }
    }

    // Make sure we're not missing a slot.
    let next = expected_iter.next();
    assert_eq!(next, None, "there are less slots than expected.");
}

pub fn encode_and_compare(tokens: &[Token], expected: &str) {
    assert_slots(&encode(tokens), expected);
}
