//! Implements `BoardGeometry`.

use lazy_static::lazy_static;
use crate::board::*;
use crate::bitsets::*;


const BISHOP_ATTACKS_SIZE: usize = 5248;
const ROOK_ATTACKS_SIZE: usize = 102400;
const SLIDER_ATTACKS_SIZE: usize = BISHOP_ATTACKS_SIZE + ROOK_ATTACKS_SIZE;


/// Tables and methods useful for move generation, pin resolution, and
/// static exchange evaluation.
#[derive(Debug)]
pub struct BoardGeometry {
    /// Contains bitboards with all squares lying at the line
    /// determined by two squares, or `0` when the squares are not
    /// aligned.
    ///
    /// ```text
    /// g.line_connecting[B2][F6]
    /// . . . . . . . 1
    /// . . . . . . 1 .
    /// . . . . . 1 . .
    /// . . . . 1 . . .
    /// . . . 1 . . . .
    /// . . 1 . . . . .
    /// . 1 . . . . . .
    /// 1 . . . . . . .
    /// ```
    pub line_connecting: [[Bitboard; 64]; 64],

    /// Contains bitboards with all squares lying strictly between two
    /// squares (the two squares themselves excluded).
    ///
    /// ```text
    /// g.line_between[B2][F6]
    /// . . . . . . . .
    /// . . . . . . . .
    /// . . . . . . . .
    /// . . . . 1 . . .
    /// . . . 1 . . . .
    /// . . 1 . . . . .
    /// . . . . . . . .
    /// . . . . . . . .
    /// ```
    pub line_between: [[Bitboard; 64]; 64],

    /// Contains bitboards with all squares hidden behind a blocker
    /// from attacker's position.
    ///
    /// ```text
    /// g.squares_behind_blocker[B2][F6]
    /// . . . . . . . 1
    /// . . . . . . 1 .
    /// . . . . . B . .
    /// . . . . . . . .
    /// . . . . . . . .
    /// . . . . . . . .
    /// . A . . . . . .
    /// . . . . . . . .
    /// ```
    pub squares_behind_blocker: [[Bitboard; 64]; 64],

    /// Contains bitboards with the squares attacked by a pawn of a
    /// given color from a given square.
    pub pawn_attacks: [[Bitboard; 64]; 2],

    knight_attacks: [Bitboard; 64],
    king_attacks: [Bitboard; 64],
    bishop_map: [AttacksMagic; 64],
    rook_map: [AttacksMagic; 64],
    slider_attacks: Vec<Bitboard>,
}


impl BoardGeometry {
    /// Creates and initializes a new instance.
    fn new() -> BoardGeometry {
        let mut g = BoardGeometry {
            line_connecting: [[0; 64]; 64],
            line_between: [[0; 64]; 64],
            squares_behind_blocker: [[0; 64]; 64],
            pawn_attacks: [[0; 64]; 2],
            knight_attacks: [0; 64],
            king_attacks: [0; 64],
            bishop_map: [AttacksMagic::default(); 64],
            rook_map: [AttacksMagic::default(); 64],
            slider_attacks: Vec::with_capacity(SLIDER_ATTACKS_SIZE),
        };

        // Fill `g.line_connecting`.
        for a in 0..64 {
            let lines = [bb_file(a), bb_rank(a), bb_diag(a), bb_anti_diag(a)];
            for b in a + 1..64 {
                for line in lines.iter() {
                    if *line & (1 << b) != 0 {
                        g.line_connecting[a][b] = *line;
                        g.line_connecting[b][a] = *line;
                        break;
                    }
                }
            }
        }

        // Fill `g.squares_behind_blocker`.
        for a in 0..64 {
            for b in 0..64 {
                let queen_attacks_from_a = bb_rook_attacks(a, 1 << a | 1 << b) |
                                           bb_bishop_attacks(a, 1 << a | 1 << b);
                g.squares_behind_blocker[a][b] = g.line_connecting[a][b] & !(1 << a) &
                                                 !queen_attacks_from_a;
            }
        }

        // Fill `g.line_between`.
        for a in 0..64 {
            for b in 0..64 {
                g.line_between[a][b] = g.line_connecting[a][b] &
                                       !g.squares_behind_blocker[a][b] &
                                       !g.squares_behind_blocker[b][a] &
                                       !(1 << a) &
                                       !(1 << b);
            }
        }

        // Fill `g.pawn_attacks`.
        for us in 0..2 {
            for a in 0..64 {
                g.pawn_attacks[us][a] = pawn_attacks_bb(us, square_bb(a));
            }
        }

        // Fill `g.knight_attacks` and `g.king_attacks`.
        fill_step_attacks(&mut g.knight_attacks,
                          &[(-1, -2), (-2, -1), (-2, 1), (-1, 2), (1, -2), (2, -1), (2, 1),
                            (1, 2)]);
        fill_step_attacks(&mut g.king_attacks,
                          &[(1, -1), (1, 0), (1, 1), (0, -1), (0, 1), (-1, -1), (-1, 0),
                            (-1, 1)]);

        // Initialize the sliding piece attack tables.
        //
        // For every chess engine it is very important to be able to
        // very quickly find the attacking sets for all pieces, from
        // all possible origin squares, and all possible board
        // occupations. We use the "magic bitboards" technique to
        // access pre-calculated attacking sets of the sliding pieces
        // (bishop, rook, queen). The "magic bitboards" technique
        // consists of four steps:
        //
        // 1. Mask the relevant occupancy bits to form a key. For
        //    example, for a rook on A1 the relevant occupancy bits
        //    are A2-A7 and B1-G1.
        //
        // 2. Multiply the key by a "magic number" to obtain an index
        //    mapping. Suitable magic numbers can be found by
        //    brute-force trial and error.
        //
        // 3. Right shift the index mapping by `64 - n` bits to create
        //    an index, where `n` is the number of bits in the index.
        //
        // 4. Use the index to reference a pre-initialized attacks
        //    database.
        init_slider_map(BISHOP,
                        &BISHOP_MAGICS,
                        &mut g.bishop_map,
                        &mut g.slider_attacks,
                        false);
        assert_eq!(g.slider_attacks.len(), BISHOP_ATTACKS_SIZE);
        init_slider_map(ROOK,
                        &ROOK_MAGICS,
                        &mut g.rook_map,
                        &mut g.slider_attacks,
                        false);
        assert_eq!(g.slider_attacks.len(), SLIDER_ATTACKS_SIZE);

        g
    }

    /// Returns a reference to an initialized `BoardGeometry` object.
    ///
    /// The object is created only during the first call. All next
    /// calls will return a reference to the same object.
    #[inline]
    pub fn get() -> &'static BoardGeometry {
        lazy_static! {
            static ref GEOMETRY: BoardGeometry = BoardGeometry::new();
        }
        &GEOMETRY
    }

    /// Returns the set of squares that are attacked by a piece from a
    /// given square.
    ///
    /// This function returns the set of squares that are attacked by
    /// a piece of type `piece` from the square `from_square`, on a
    /// board which is occupied with pieces according to the
    /// `occupied` bitboard. `piece` **must not** be `PAWN`. It does
    /// not matter if `from_square` is occupied or not.
    #[inline]
    pub fn attacks_from(&self,
                        piece: PieceType,
                        from_square: Square,
                        occupied: Bitboard)
                        -> Bitboard {
        debug_assert!(piece != PAWN && piece < PIECE_TYPE_NONE);
        debug_assert!(from_square <= 63);
        match piece {
            KNIGHT => self.knight_attacks[from_square],
            BISHOP => self.bishop_map[from_square].attacks(occupied, &self.slider_attacks),
            ROOK => self.rook_map[from_square].attacks(occupied, &self.slider_attacks),
            QUEEN => {
                self.bishop_map[from_square].attacks(occupied, &self.slider_attacks) |
                self.rook_map[from_square].attacks(occupied, &self.slider_attacks)
            }
            _ => self.king_attacks[from_square],
        }
    }

    /// Returns `true` if three squares lie on a common line.
    #[inline]
    pub fn aligned(&self, a: Square, b: Square, c: Square) -> bool {
        self.line_connecting[a][b] & square_bb(c) != 0
    }

    /// Returns the set of squares that have to be vacant and safe for
    /// a castling move.
    ///
    /// `ksq` and `rsq` are king's and rook's home squares, `kto` and
    /// `rto` their post-castle squares. The home squares themselves
    /// are excluded from the path.
    #[inline]
    pub fn castling_path(&self,
                         ksq: Square,
                         kto: Square,
                         rsq: Square,
                         rto: Square)
                         -> Bitboard {
        (self.line_between[ksq][kto] | self.line_between[rsq][rto] | square_bb(kto) |
         square_bb(rto)) & !(square_bb(ksq) | square_bb(rsq))
    }
}


/// An object that for a particular slider (bishop or rook) at a
/// particular square, can "magically" find the corresponding attack
/// set, for all possible board occupations.
#[derive(Copy, Clone, Default, Debug)]
struct AttacksMagic {
    offset: usize,
    mask: Bitboard,
    magic: u64,
    shift: u32,
}

impl AttacksMagic {
    /// Returns the attack set for a given board occupation.
    #[inline(always)]
    fn attacks(&self, occupied: Bitboard, table: &[Bitboard]) -> Bitboard {
        let index = self.magic.wrapping_mul(occupied & self.mask) >> self.shift;
        table[self.offset.wrapping_add(index as usize)]
    }
}


/// A helper function for `BoardGeometry::new`. It initializes an
/// attack table from a list of (rank, file) steps.
fn fill_step_attacks(attacks: &mut [Bitboard; 64], offsets: &[(isize, isize)]) {
    for (i, attack_set) in attacks.iter_mut().enumerate() {
        let (r, c) = ((i / 8) as isize, (i % 8) as isize);
        for &(dr, dc) in offsets {
            if r + dr >= 0 && c + dc >= 0 && r + dr < 8 && c + dc < 8 {
                *attack_set |= 1 << ((r + dr) * 8 + c + dc);
            }
        }
    }
}


/// A helper function for `BoardGeometry::new`. It initializes the
/// look-up tables for a particular slider (bishop or rook).
///
/// When `from_scratch` is `true`, new magic numbers are carved out by
/// random trial and error instead of using the pre-calculated ones.
fn init_slider_map(piece: PieceType,
                   magics: &[u64; 64],
                   piece_map: &mut [AttacksMagic; 64],
                   table: &mut Vec<Bitboard>,
                   from_scratch: bool) {
    use rand::Rng;
    assert!(piece == BISHOP || piece == ROOK);
    let mut rng = rand::thread_rng();
    let attacks: fn(Square, Bitboard) -> Bitboard = if piece == BISHOP {
        bb_bishop_attacks
    } else {
        bb_rook_attacks
    };

    for (sq, entry) in piece_map.iter_mut().enumerate() {
        let edges = ((BB_RANK_1 | BB_RANK_8) & !bb_rank(sq)) |
                    ((BB_FILE_A | BB_FILE_H) & !bb_file(sq));
        let mask = attacks(sq, 1 << sq) & !edges;
        let num_ones = mask.count_ones();
        let shift = 64 - num_ones;

        // Enumerate all relevant occupancies and their reference
        // attack sets.
        let mut occupancy = vec![0; 1 << num_ones];
        let mut reference = vec![0; 1 << num_ones];
        let mut size = 0;
        let mut occ: Bitboard = 0;
        loop {
            occupancy[size] = occ;
            reference[size] = attacks(sq, occ | (1 << sq));
            size += 1;
            occ = occ.wrapping_sub(mask) & mask;
            if occ == 0 {
                break;
            }
        }

        let mut magic = magics[sq];

        'outer: loop {
            if from_scratch {
                // Generate a new random magic candidate.
                loop {
                    magic = rng.gen::<u64>() & rng.gen::<u64>() & rng.gen::<u64>();
                    if (magic.wrapping_mul(mask) >> 56).count_ones() >= 6 {
                        break;
                    }
                }
            }

            let mut attack_sets = vec![0; size];
            for i in 0..size {
                let index = magic.wrapping_mul(occupancy[i]) >> shift;
                let attack_set = &mut attack_sets[index as usize];
                if *attack_set != 0 && *attack_set != reference[i] {
                    assert!(from_scratch,
                            "pre-calculated magic is incorrect (square {}, {})",
                            sq,
                            if piece == BISHOP { "bishop" } else { "rook" });
                    continue 'outer;
                }
                *attack_set = reference[i];
            }

            *entry = AttacksMagic {
                offset: table.len(),
                mask,
                magic,
                shift,
            };
            table.extend_from_slice(&attack_sets);
            break;
        }
    }
}


/// A helper function. It returns the set of squares that are attacked
/// by a rook from a given square.
fn bb_rook_attacks(from_square: Square, occupied: Bitboard) -> Bitboard {
    bb_line_attacks(bb_file(from_square), from_square, occupied) |
    bb_line_attacks(bb_rank(from_square), from_square, occupied)
}


/// A helper function. It returns the set of squares that are attacked
/// by a bishop from a given square.
fn bb_bishop_attacks(from_square: Square, occupied: Bitboard) -> Bitboard {
    bb_line_attacks(bb_diag(from_square), from_square, occupied) |
    bb_line_attacks(bb_anti_diag(from_square), from_square, occupied)
}


/// A helper function for `bb_rook_attacks` and `bb_bishop_attacks`.
///
/// This function calculates the set of squares, lying on a single
/// straight line (a file, rank, diagonal, or anti-diagonal), that a
/// piece can attack from a given square and given board occupancy.
fn bb_line_attacks(line: Bitboard, from_square: Square, occupied: Bitboard) -> Bitboard {
    let from_square_bb = 1u64 << from_square;
    debug_assert!(from_square_bb & line != 0);
    let potential_blockers = occupied & line;
    let forward = potential_blockers.wrapping_sub(from_square_bb.wrapping_mul(2));
    let rev = reverse(reverse(potential_blockers)
                          .wrapping_sub(reverse(from_square_bb).wrapping_mul(2)));
    (forward ^ rev) & line
}


/// A helper function for `bb_line_attacks`. It reverses the order of
/// the bits in a 64-bit number.
fn reverse(v: u64) -> u64 {
    v.reverse_bits()
}


/// Pre-calculated bishop magic constants.
const BISHOP_MAGICS: [u64; 64] =
    [306397059236266368, 6638343277122827280, 10377420549504106496, 9193021019258913,
     2306408226914042898, 10379110636817760276, 27167319028441088, 7566153073497751552,
     1513227076520969216, 301917653126479936, 72075465430409232, 2343002121441460228,
     36033212782477344, 9223373154083475456, 6935629192638251008, 72621648200664064,
     2310506081245267984, 2533291987569153, 146934404644733024, 1838417834950912,
     579856052833622016, 1729946448243595776, 705208029025040, 2886877732040869888,
     10092575566416331020, 5635409948247040, 738739924278198804, 4648849515743289408,
     9233786889293807616, 1155253577929753088, 435164712050360592, 3026700562025580641,
     4612284839965491969, 10448650511900137472, 571823356120080, 40569782189687936,
     148620986995048708, 4901113822871308288, 4612077461748908288, 10204585674276944,
     2534512027246592, 5766297627561820676, 13809969191200768, 1153062656578422784,
     9318235838682899712, 11533824475839595776, 433770548762247233, 92326036501692936,
     9227053213059129360, 577024872779350852, 108087561569959936, 582151826703646856,
     81404176367767, 316415319130374273, 9113856212762624, 145453328103440392,
     441392350330618400, 1126492748710916, 2309220790581891072, 3026423624667006980,
     18019391702696464, 4516931289817600, 1450317422841301124, 9246488805123342592];


/// Pre-calculated rook magic constants.
const ROOK_MAGICS: [u64; 64] =
    [36028867955671040, 2395917338224361536, 936757656041832464, 648535942831284356,
     36037595259731970, 13943151043426386048, 432349966580056576, 4683745813775001856,
     1191624314978336800, 4611756662317916160, 4625338105090543616, 140806208356480,
     1688987371057664, 9288708641522688, 153403870897537280, 281550411726850,
     2401883155071024, 1206964838111645696, 166705754384925184, 36039792408011264,
     10376580514281768960, 9148486532465664, 578787319189340418, 398007816633254020,
     2341872150903791616, 2314850762536009728, 297238127310798880, 2251868801728768,
     2594082183614301184, 820222482337235456, 37717655469424904, 577596144088011012,
     1152991874030502016, 3171026856472219648, 20415869351890944, 4611844348286345472,
     2455605323386324224, 140754676613632, 1740713828645089416, 58361257132164,
     70370893791232, 9227880322828615684, 72092778695295040, 577023839834341392,
     4723150143565660416, 563087661073408, 651083773116450, 72128789630550047,
     153192758223054976, 869194865525653568, 4972009250306933248, 1031325449119138048,
     1297041090863464576, 580401419157405824, 1657992643584, 306245066729521664,
     15206439601351819394, 14143290885479661953, 1688988407201810, 18065251325837538,
     1152927311403745429, 162411078742050817, 334255838724676, 27323018585852550];
